pub const CURSOR_COMMITS: &str = "cursor_commits_total";
pub const CURSOR_COMMIT_REQUESTS: &str = "cursor_commit_requests_total";
pub const CURSOR_COMMIT_CAS_CONFLICTS: &str = "cursor_commit_cas_conflicts_total";
pub const CURSOR_COMMIT_DURATION: &str = "cursor_commit_duration_seconds";
pub const CURSOR_READS: &str = "cursor_reads_total";
