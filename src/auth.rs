use chrono::Local;
use sha2::{Digest, Sha512};

use crate::request::MethodRequest;

pub const SALT: &str = "Otus";
pub const ADMIN_LOGIN: &str = "admin";
pub const ADMIN_SALT: &str = "42";

/// Who is calling: the privileged identity or an ordinary account.
///
/// A closed two-way choice. Each variant derives its own expected digest:
/// the privileged one is bound to the current hour to bound replay exposure,
/// the ordinary one carries no time binding. That asymmetry is deployed
/// behavior and is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Admin,
    Regular { account: String, login: String },
}

impl Caller {
    pub fn from_request(request: &MethodRequest) -> Self {
        if request.is_admin() {
            Caller::Admin
        } else {
            Caller::Regular {
                account: request.account().to_string(),
                login: request.login().to_string(),
            }
        }
    }

    /// The SHA-512 hex digest a caller of this identity must present.
    pub fn expected_digest(&self) -> String {
        match self {
            Caller::Admin => {
                let hour_stamp = Local::now().format("%Y%m%d%H").to_string();
                sha512_hex(&format!("{hour_stamp}{ADMIN_SALT}"))
            }
            Caller::Regular { account, login } => {
                sha512_hex(&format!("{account}{login}{SALT}"))
            }
        }
    }
}

/// Compare the supplied token against the digest expected for the caller.
pub fn check_auth(request: &MethodRequest) -> bool {
    Caller::from_request(request).expected_digest() == request.token()
}

fn sha512_hex(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
