//! Login evaluation actions.
//!
//! | Action | When to call |
//! |--------|--------------|
//! | [`ValidateLoginAction`] | before checking credentials |
//! | [`RecordLoginAction`] | after checking credentials |

mod record_login;
mod validate_login;

pub use record_login::RecordLoginAction;
pub use validate_login::ValidateLoginAction;
