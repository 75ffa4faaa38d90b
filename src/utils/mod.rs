mod metadata;
mod otp;
mod password;

pub use metadata::{parse_client_metadata, ClientMetadata};
pub use otp::{FixedOtpGenerator, OtpGenerator, RandomOtpGenerator, OTP_LEN};
pub use password::{hash_password, verify_password, Password, PasswordHashString};
