use crate::errors::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum length of a patch name derived from a message
pub const DEFAULT_NAME_LENGTH: usize = 30;

/// An author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new<N: Into<String>, E: Into<String>>(name: N, email: E) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Build from a git signature, replacing invalid UTF-8
    pub fn from_signature(sig: &git2::Signature<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        }
    }

    /// `Co-authored-by` trailer line for this identity
    pub fn co_author_trailer(&self) -> String {
        format!("{CO_AUTHORED_BY} {self}")
    }
}

pub const CO_AUTHORED_BY: &str = "Co-authored-by:";

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

impl FromStr for Identity {
    type Err = StackError;

    /// Parse `Name <email>`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let malformed = || StackError::general(format!("incorrect \"name <email>\" string: {s}"));

        let open = s.find('<').ok_or_else(malformed)?;
        if !s.ends_with('>') {
            return Err(malformed());
        }
        let name = s[..open].trim();
        let email = s[open + 1..s.len() - 1].trim();
        if name.is_empty() || email.contains('<') || email.contains('>') {
            return Err(malformed());
        }
        Ok(Identity::new(name, email))
    }
}

/// A validated patch name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatchName(String);

impl PatchName {
    /// Validate a candidate name against the patch-name grammar
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        match Self::grammar_error(&name) {
            None => Ok(PatchName(name)),
            Some(reason) => Err(StackError::general(format!(
                "invalid patch name `{name}`: {reason}"
            ))),
        }
    }

    fn grammar_error(name: &str) -> Option<&'static str> {
        let Some(first) = name.chars().next() else {
            return Some("must not be empty");
        };
        if !first.is_ascii_alphanumeric() {
            return Some("must start with a letter or digit");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Some("only letters, digits, `-`, `_` and `.` are allowed");
        }
        if name.contains("..") {
            return Some("must not contain `..`");
        }
        if name.ends_with('.') || name.ends_with(".lock") {
            return Some("must not end with `.` or `.lock`");
        }
        None
    }

    pub fn is_valid(name: &str) -> bool {
        Self::grammar_error(name).is_none()
    }

    /// Derive a name from the first non-empty line of a message
    pub fn slug(message: &str, len_limit: usize) -> PatchName {
        let subject = message
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");

        let mut slug = String::with_capacity(subject.len());
        for c in subject.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let mut slug = slug.trim_matches('-').to_string();
        if len_limit > 0 && slug.len() > len_limit {
            slug.truncate(len_limit);
            slug = slug.trim_end_matches('-').to_string();
        }
        if slug.is_empty() {
            slug = "patch".to_string();
        }
        // slug only holds [a-z0-9-] and starts with [a-z0-9]
        PatchName(slug)
    }

    /// Append `-1`, `-2`, ... until `taken` no longer matches
    pub fn uniquify(self, taken: impl Fn(&PatchName) -> bool) -> PatchName {
        if !taken(&self) {
            return self;
        }
        let mut n = 1usize;
        loop {
            let candidate = PatchName(format!("{}-{n}", self.0));
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PatchName {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        PatchName::new(s)
    }
}

impl TryFrom<String> for PatchName {
    type Error = StackError;

    fn try_from(value: String) -> Result<Self> {
        PatchName::new(value)
    }
}

impl From<PatchName> for String {
    fn from(name: PatchName) -> Self {
        name.0
    }
}

impl AsRef<str> for PatchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PatchName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PatchName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Whether a patch is materialized on the branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchState {
    Applied,
    Unapplied,
}

/// A single named patch backed by one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub name: PatchName,
    /// Commit hash in the object store
    pub commit_id: String,
    pub author: Identity,
    pub message: String,
    pub state: PatchState,
}

impl Patch {
    pub fn new(
        name: PatchName,
        commit_id: String,
        author: Identity,
        message: String,
        state: PatchState,
    ) -> Self {
        Self {
            name,
            commit_id,
            author,
            message,
            state,
        }
    }

    /// Build a patch record from a commit
    pub fn from_commit(name: PatchName, commit: &git2::Commit<'_>, state: PatchState) -> Self {
        Self {
            name,
            commit_id: commit.id().to_string(),
            author: Identity::from_signature(&commit.author()),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            state,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.state == PatchState::Applied
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Get a short version of the commit hash
    pub fn short_hash(&self) -> &str {
        if self.commit_id.len() >= 8 {
            &self.commit_id[..8]
        } else {
            &self.commit_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_name_grammar() {
        assert!(PatchName::new("p1").is_ok());
        assert!(PatchName::new("fix-the_bug.v2").is_ok());
        assert!(PatchName::new("9lives").is_ok());

        for bad in ["", "-p", ".hidden", "a b", "a/b", "a..b", "p.", "p.lock", "naïve"] {
            let err = PatchName::new(bad).unwrap_err();
            assert!(
                matches!(err, StackError::General(_)),
                "expected general error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_slug_from_message() {
        assert_eq!(PatchName::slug("wee woo", 30), "wee-woo");
        assert_eq!(PatchName::slug("\n\n  Fix: the  Parser!\n\nbody", 30), "fix-the-parser");
        assert_eq!(PatchName::slug("!!!", 30), "patch");
        assert_eq!(PatchName::slug("", 30), "patch");
    }

    #[test]
    fn test_slug_truncates_on_clean_boundary() {
        let slug = PatchName::slug("abcdefghij klmnopqrst uvwxyz0123 4567", 21);
        assert_eq!(slug, "abcdefghij-klmnopqrst");
        assert!(PatchName::is_valid(slug.as_str()));
    }

    #[test]
    fn test_uniquify() {
        let taken = ["wee-woo", "wee-woo-1"];
        let name = PatchName::slug("wee woo", 30).uniquify(|n| taken.contains(&n.as_str()));
        assert_eq!(name, "wee-woo-2");

        let name = PatchName::new("fresh").unwrap().uniquify(|_| false);
        assert_eq!(name, "fresh");
    }

    #[test]
    fn test_identity_parse_and_display() {
        let id: Identity = "Some Author <some@example.com>".parse().unwrap();
        assert_eq!(id, Identity::new("Some Author", "some@example.com"));
        assert_eq!(id.to_string(), "Some Author <some@example.com>");
        assert_eq!(
            id.co_author_trailer(),
            "Co-authored-by: Some Author <some@example.com>"
        );

        assert!("no email".parse::<Identity>().is_err());
        assert!("<only@email>".parse::<Identity>().is_err());
        assert!("Name <a@b".parse::<Identity>().is_err());
    }

    #[test]
    fn test_patch_name_serde_validates() {
        let ok: PatchName = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(ok, "p1");
        assert!(serde_json::from_str::<PatchName>("\"a b\"").is_err());
    }
}
