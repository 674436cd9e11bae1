/// Error code registry for stagegate
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 6000-6999: Git errors
/// - 7000-7999: Validation errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_INVALID_JSON: u16 = 1003;
    pub const CONFIG_INVALID_TOML: u16 = 1004;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_READ_FAILED: u16 = 1006;

    // Git errors (6000-6999)
    pub const GIT_GENERIC: u16 = 6000;
    pub const GIT_REPO_NOT_FOUND: u16 = 6001;
    pub const GIT_COMMAND_FAILED: u16 = 6002;
    pub const GIT_REPO_LOCKED: u16 = 6003;
    pub const GIT_BACKUP_MISSING: u16 = 6004;
    pub const GIT_HIDE_UNSTAGED: u16 = 6005;
    pub const GIT_RESTORE_UNSTAGED: u16 = 6006;
    pub const GIT_RESTORE_ORIGINAL: u16 = 6007;
    pub const GIT_MERGE_STATUS: u16 = 6008;
    pub const GIT_EMPTY_COMMIT: u16 = 6009;

    // Validation errors (7000-7999)
    pub const VALIDATION_GENERIC: u16 = 7000;
    pub const VALIDATION_INVALID_OPTIONS: u16 = 7001;
    pub const VALIDATION_FUNCTION_TASK: u16 = 7002;
    pub const VALIDATION_EMPTY_COMMAND: u16 = 7003;
    pub const VALIDATION_INVALID_PATTERN: u16 = 7004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "No configuration found",
        1002 => "Invalid YAML syntax in configuration",
        1003 => "Invalid JSON syntax in configuration",
        1004 => "Invalid TOML syntax in configuration",
        1005 => "Invalid value in configuration",
        1006 => "Configuration file could not be read",

        6000 => "Generic git error",
        6001 => "Not a git repository",
        6002 => "Git command failed",
        6003 => "Another git process is running",
        6004 => "Automatic backup is missing",
        6005 => "Unstaged changes could not be hidden",
        6006 => "Unstaged changes could not be restored",
        6007 => "Original state could not be restored",
        6008 => "Merge status could not be restored",
        6009 => "Prevented an empty git commit",

        7000 => "Generic validation error",
        7001 => "Invalid options",
        7002 => "Function task returned an invalid value",
        7003 => "Empty command",
        7004 => "Invalid glob pattern",

        _ => "Unknown error code",
    }
}
