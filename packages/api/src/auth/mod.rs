//! Authentication: local e-mail + password accounts and cookie sessions.

mod password;
mod session;

pub use password::{check_password_policy, hash_password, verify_password, MIN_PASSWORD_LEN};
pub use session::{start_session, CurrentUser, SESSION_USERNAME_KEY, SESSION_USER_ID_KEY};
