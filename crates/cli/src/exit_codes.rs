//! CLI exit code registry.
//!
//! Single source of truth for `batcvd` exit codes. Scripts that chain the
//! daily stages rely on these values.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success, output workbook written                         |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad arguments)                              |
//! | 3    | I/O error (input unreadable, output not writable)        |
//! | 4    | Config error (TOML unparsable or invalid)                |
//! | 5    | Validation error (required column or sheet missing)      |

/// Success - stage completed and its workbook was written.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own parse failures.
pub const EXIT_USAGE: u8 = 2;

/// An input could not be opened/parsed, or the output could not be saved.
pub const EXIT_IO: u8 = 3;

/// Config file unreadable as TOML, or rejected by validation.
pub const EXIT_CONFIG: u8 = 4;

/// Input lacks a column or sheet the stage requires. No output is written.
pub const EXIT_VALIDATION: u8 = 5;
