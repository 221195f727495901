//! CLI Exit Code Registry
//!
//! Single source of truth for `locus` exit codes. Scripts rely on them.
//!
//! A batch run that completes exits 0 even when individual entities fail;
//! per-entity failures are reported, not signalled. Non-zero codes mean the
//! run could not start or could not persist its results.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain        | Description                                   |
//! |---------|---------------|-----------------------------------------------|
//! | 0       | Universal     | Success                                       |
//! | 1       | Universal     | General error (unspecified)                   |
//! | 2       | Universal     | CLI usage error (bad args)                    |
//! | 3-9     | config        | Config file, credentials, reference data      |
//! | 10-19   | data          | Entity store, caches, output files            |
//! | 20-29   | municipality  | Municipality store checks                     |

// =============================================================================
// Universal (0-2)
// =============================================================================

pub const EXIT_SUCCESS: u8 = 0;

/// General error. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file missing (explicit path), unreadable, or invalid.
pub const EXIT_CONFIG: u8 = 3;

/// `geocoder.api_key_env` names a variable that is not set.
pub const EXIT_MISSING_CREDENTIAL: u8 = 4;

/// Reference municipality CSV or overrides file missing.
pub const EXIT_REFERENCE_MISSING: u8 = 5;

/// Command needs a geocoder but `geocoder.base_url` is unset.
pub const EXIT_GEOCODER_UNCONFIGURED: u8 = 6;

/// Alternative area-code table failed to load.
pub const EXIT_AREA_CODES: u8 = 7;

// =============================================================================
// Data (10-19)
// =============================================================================

/// Entity file or data store could not be read or parsed.
pub const EXIT_DATA_READ: u8 = 10;

/// Checkpoint, cache flush, or report output could not be written.
pub const EXIT_DATA_WRITE: u8 = 11;

// =============================================================================
// Municipality (20-29)
// =============================================================================

/// `municipalities check --strict` found missing municipalities.
pub const EXIT_MUNICIPALITIES_INCOMPLETE: u8 = 20;
