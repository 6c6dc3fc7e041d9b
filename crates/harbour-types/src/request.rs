use serde::{Deserialize, Serialize};

/// Variables decoded from one protocol request: routing segments, the JSON
/// body and the raw `Authorization` header.
///
/// The oid is kept exactly as received; consumers validate it after
/// authentication so that a bad credential is always reported first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVars {
    #[serde(default)]
    pub oid: String,
    #[serde(default)]
    pub size: i64,
    #[serde(skip)]
    pub namespace: String,
    #[serde(skip)]
    pub repo: String,
    #[serde(skip)]
    pub authorization: String,
}

impl RequestVars {
    pub fn new(oid: impl Into<String>, size: i64) -> Self {
        Self {
            oid: oid.into(),
            size,
            ..Self::default()
        }
    }

    pub fn with_repo(mut self, namespace: impl Into<String>, repo: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.repo = repo.into();
        self
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = authorization.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let rv = RequestVars::new("abc", 12)
            .with_repo("org", "repo")
            .with_authorization("Basic eA==");
        assert_eq!(rv.oid, "abc");
        assert_eq!(rv.size, 12);
        assert_eq!(rv.namespace, "org");
        assert_eq!(rv.repo, "repo");
        assert_eq!(rv.authorization, "Basic eA==");
    }

    #[test]
    fn body_decodes_oid_and_size_only() {
        let rv: RequestVars = serde_json::from_str(
            r#"{"oid":"abc","size":42,"repo":"ignored","user":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(rv.oid, "abc");
        assert_eq!(rv.size, 42);
        assert!(rv.repo.is_empty());
    }
}
