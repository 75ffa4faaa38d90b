use rand::{rngs::OsRng, Rng};

/// OTP length in decimal digits.
pub const OTP_LEN: usize = 6;

/// Source of one-time passwords. Implementations must be stateless; no two
/// sequential codes may be predictable from each other.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Production generator drawing digits from the OS CSPRNG.
#[derive(Debug, Clone, Default)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self) -> String {
        let mut rng = OsRng;
        (0..OTP_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10)))
            .collect()
    }
}

/// Test generator returning a fixed code.
#[derive(Debug, Clone)]
pub struct FixedOtpGenerator(pub String);

impl OtpGenerator for FixedOtpGenerator {
    fn generate(&self) -> String {
        self.0.clone()
    }
}
