/// Router Module Index
///
/// Routes are grouped by the access they require, and `create_router` applies
/// the matching middleware to each group as a whole.

/// No credentials required. Post reads are approved-only.
pub mod public;

/// Requires a valid access token.
pub mod authenticated;

/// Requires an admin or superadmin.
pub mod admin;
