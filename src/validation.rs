//! Constraint validation for decoded request bodies
//!
//! A body bound with [`param::valid_body`](crate::param::valid_body) is
//! checked through its [`Validate`] impl right after decoding. Violations
//! reach the client as a 400 whose body lists one message per line.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// A type whose values can be checked against constraints
pub trait Validate {
    /// `Err` carries the violation messages in check order
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// Collects `"<field> <message>"` lines for a [`Validate`] impl.
///
/// Absent values pass every check except [`not_null`](Self::not_null).
///
/// ```rust
/// use component_dispatcher::{Validate, Violations};
///
/// struct SignUp { name: Option<String>, email: Option<String> }
///
/// impl Validate for SignUp {
///     fn validate(&self) -> Result<(), Vec<String>> {
///         Violations::new()
///             .not_null("name", self.name.as_ref())
///             .size("name", self.name.as_deref(), 2, 30)
///             .email("email", self.email.as_deref())
///             .finish()
///     }
/// }
///
/// let bad = SignUp { name: Some("a".into()), email: Some("nope".into()) };
/// assert_eq!(
///     bad.validate().unwrap_err(),
///     vec!["name size must be between 2 and 30", "email must be a well-formed email address"],
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    messages: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation for `field`
    pub fn add(mut self, field: &str, message: &str) -> Self {
        self.messages.push(format!("{} {}", field, message));
        self
    }

    pub fn not_null<T>(self, field: &str, value: Option<T>) -> Self {
        self.not_null_with(field, value, "must not be null")
    }

    pub fn not_null_with<T>(self, field: &str, value: Option<T>, message: &str) -> Self {
        match value {
            Some(_) => self,
            None => self.add(field, message),
        }
    }

    /// Character count within `min..=max`
    pub fn size(self, field: &str, value: Option<&str>, min: usize, max: usize) -> Self {
        let message = format!("size must be between {} and {}", min, max);
        self.size_with(field, value, min, max, &message)
    }

    pub fn size_with(
        self,
        field: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
        message: &str,
    ) -> Self {
        match value {
            Some(text) => {
                let len = text.chars().count();
                if len < min || len > max {
                    self.add(field, message)
                } else {
                    self
                }
            }
            None => self,
        }
    }

    pub fn email(self, field: &str, value: Option<&str>) -> Self {
        self.email_with(field, value, "must be a well-formed email address")
    }

    pub fn email_with(self, field: &str, value: Option<&str>, message: &str) -> Self {
        match value {
            Some(text) if !EMAIL.is_match(text) => self.add(field, message),
            _ => self,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn finish(self) -> Result<(), Vec<String>> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(self.messages)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_pass() {
        let result = Violations::new()
            .not_null("name", Some("ana"))
            .size("name", Some("ana"), 1, 10)
            .email("email", Some("ana@example.com"))
            .finish();
        assert!(result.is_ok());
    }

    #[test]
    fn test_absent_values_only_fail_not_null() {
        let errors = Violations::new()
            .size("name", None, 3, 5)
            .email("email", None)
            .not_null::<&str>("name", None)
            .finish()
            .unwrap_err();
        assert_eq!(errors, vec!["name must not be null"]);
    }

    #[test]
    fn test_size_counts_chars() {
        let ok = Violations::new().size("name", Some("ñandú"), 5, 5);
        assert!(ok.is_empty());
        let too_long = Violations::new().size_with("name", Some("abcdef"), 1, 5, "too long");
        assert_eq!(too_long.finish().unwrap_err(), vec!["name too long"]);
    }

    #[test]
    fn test_email_pattern() {
        for bad in ["plain", "a@b", "a b@c.d", "@c.d"] {
            assert!(!Violations::new().email("email", Some(bad)).is_empty(), "{bad}");
        }
        assert!(Violations::new().email("email", Some("a@b.c")).is_empty());
    }
}
