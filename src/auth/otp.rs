use rand::rngs::OsRng;
use rand::Rng;

/// Purpose of a one-time code. Picks the email copy; the code mechanics
/// are identical for both flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpAction {
    EmailVerification,
    PasswordReset,
}

impl OtpAction {
    pub fn subject(&self) -> &'static str {
        match self {
            OtpAction::EmailVerification => "Your CollabSpace email verification code",
            OtpAction::PasswordReset => "Your CollabSpace password reset code",
        }
    }

    /// Render the outbound email body. The validity window in the copy
    /// comes from the same configuration the expiry check uses.
    pub fn email_body(&self, code: &str, valid_minutes: i64) -> String {
        let intro = match self {
            OtpAction::EmailVerification => "Use this code to verify your email address:",
            OtpAction::PasswordReset => "Use this code to reset your password:",
        };
        format!(
            "<div style=\"font-family:sans-serif\">\
             <p>{}</p>\
             <p style=\"font-size:24px;font-weight:bold;letter-spacing:4px\">{}</p>\
             <p>The code is valid for {} minutes.</p>\
             <p>If you did not request it, you can ignore this email.</p>\
             </div>",
            intro, code, valid_minutes
        )
    }
}

/// Six digit numeric code, uniform over 100000..=999999.
pub fn generate_code() -> String {
    let code: u32 = OsRng.gen_range(100_000..=999_999);
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().expect("numeric code");
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn email_body_embeds_code_and_validity_window() {
        let body = OtpAction::EmailVerification.email_body("123456", 10);
        assert!(body.contains("123456"));
        assert!(body.contains("10 minutes"));
    }

    #[test]
    fn subjects_differ_by_action() {
        assert_ne!(
            OtpAction::EmailVerification.subject(),
            OtpAction::PasswordReset.subject()
        );
        assert!(OtpAction::PasswordReset.subject().contains("password reset"));
    }
}
