//! Secret detection, redaction and masking utilities.
//!
//! Two mechanisms live here:
//!
//! - key-based redaction (`is_secret_key`, `SecretString`) for structured
//!   values such as env vars, log fields and error metadata;
//! - text masking (`mask_text`) for free-form tool output and command lines,
//!   where a secret follows a known marker like `--s3-secret-access-key` or
//!   is the value of a flag such as `--password`.

/// Checks if a key/variable name likely refers to a secret.
///
/// # Examples
///
/// ```
/// use backup_harness_shared::is_secret_key;
///
/// assert!(is_secret_key("AZURE_ACCOUNT_KEY"));
/// assert!(is_secret_key("password"));
/// assert!(is_secret_key("BH_BACKUP_SERVICE_AUTH"));
/// assert!(!is_secret_key("ASDB_PORT"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH"]
        .iter()
        .any(|marker| key.contains(marker))
}

/// Redacts a value if the key is likely a secret.
///
/// ```
/// use backup_harness_shared::redact_if_secret;
///
/// assert_eq!(redact_if_secret("S3_SECRET_ACCESS_KEY", "abc"), "[REDACTED]");
/// assert_eq!(redact_if_secret("NAMESPACE", "source-ns1"), "source-ns1");
/// ```
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Marker/length pairs masked by [`mask_text`].
///
/// The length is the number of characters replaced after each marker.
pub const MASK_RULES: &[(&str, usize)] = &[
    ("client_id", 20),
    ("client-id", 20),
    ("client-secret", 20),
    ("secret-access-key", 20),
    ("access-key-id", 20),
    ("BEGIN PRIVATE KEY", 1000),
    ("\"endpoint\":\"", 20),
    ("tenant-id\":\"", 20),
    ("private_key_id", 30),
    ("s3-secret-access-key", 30),
    ("s3-access-key-id", 20),
];

/// Flags whose value is replaced by [`REDACTED`] in [`mask_text`], in the
/// `--flag value` and `--flag=value` forms.
pub const SECRET_FLAGS: &[&str] = &[
    "--password",
    "--azure-account-key",
    "--encryption-key-secret",
    "--auth-token",
];

/// Short password flag of `asinfo`, `aql` and `asbench` (`-P pw` or `-Ppw`).
const SHORT_PASSWORD_FLAG: &str = "-P";

/// Default maximum characters per emitted log part.
pub const LOG_PART_CHARS: usize = 500_000;

/// Mask secrets that follow known markers in free-form text.
///
/// Values of [`SECRET_FLAGS`] and of `-P` become [`REDACTED`]. Then the
/// characters after each [`MASK_RULES`] marker are replaced with alternating
/// `!` and `#` so that span keeps its length and stays visible.
///
/// ```
/// use backup_harness_shared::mask_text;
///
/// let masked = mask_text("--azure-client-id abcd");
/// assert_eq!(masked, "--azure-client-id!#!#!");
/// assert_eq!(mask_text("asinfo -U admin -P psw"), "asinfo -U admin -P [REDACTED]");
/// ```
#[must_use]
pub fn mask_text(text: &str) -> String {
    let text = redact_flag_values(text);
    let mut chars: Vec<char> = text.chars().collect();
    for (marker, length) in MASK_RULES {
        let marker: Vec<char> = marker.chars().collect();
        let mut from = 0;
        while let Some(start) = find_chars(&chars, &marker, from) {
            let mask_start = start + marker.len();
            let mask_end = mask_start.saturating_add(*length).min(chars.len());
            for (offset, slot) in chars
                .iter_mut()
                .skip(mask_start)
                .take(mask_end - mask_start)
                .enumerate()
            {
                *slot = if offset % 2 == 0 { '!' } else { '#' };
            }
            from = mask_start.saturating_add(*length);
        }
    }
    chars.into_iter().collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Value,
    QuotedValue,
}

/// Replace the values of secret flags, keeping the whitespace around them.
fn redact_flag_values(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = Pending::None;
    for piece in text.split_inclusive(char::is_whitespace) {
        let token = piece.trim_end_matches(char::is_whitespace);
        let separator = piece.get(token.len()..).unwrap_or_default();
        if token.is_empty() {
            out.push_str(separator);
            continue;
        }
        match pending {
            Pending::Value => {
                out.push_str(REDACTED);
                // A quoted value may span several tokens.
                pending = if token.starts_with('\'') && (token.len() == 1 || !token.ends_with('\''))
                {
                    Pending::QuotedValue
                } else {
                    Pending::None
                };
            },
            Pending::QuotedValue => {
                if token.ends_with('\'') {
                    pending = Pending::None;
                }
            },
            Pending::None => {
                if token == SHORT_PASSWORD_FLAG || SECRET_FLAGS.contains(&token) {
                    out.push_str(token);
                    pending = Pending::Value;
                } else if let Some((flag, _)) = token.split_once('=')
                    && SECRET_FLAGS.contains(&flag)
                {
                    out.push_str(flag);
                    out.push('=');
                    out.push_str(REDACTED);
                } else if token.starts_with(SHORT_PASSWORD_FLAG) && !token.starts_with("--") {
                    out.push_str(SHORT_PASSWORD_FLAG);
                    out.push_str(REDACTED);
                } else {
                    out.push_str(token);
                }
            },
        }
        out.push_str(separator);
    }
    out
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| position + from)
}

/// Split text into parts of at most `max_chars` characters.
///
/// Returns a single empty part for empty input so callers always log once.
#[must_use]
pub fn split_for_logging(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// A secret string wrapper that redacts on Display/Debug.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume and return the underlying secret.
    pub fn into_inner(self) -> Box<str> {
        self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl serde::Serialize for SecretString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}
