//! Mention Replacer
//!
//! Rewrites encoded mention tokens into readable text before relay:
//! - `<@U123>` → `@name` (from a directory snapshot)
//! - `<@U123|name>` → `name`
//! - `<!here>`, `<!here|@here>`, `<!channel>`, `<!everyone>` → `@here`, `@channel`, `@everyone`
//!
//! All tokens are matched in one left-to-right pass, so replaced text is
//! never rescanned.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::debug;

use crate::directory::UserRepository;
use crate::error::Result;
use crate::model::User;

static MENTION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<@([A-Za-z0-9]+)\|([^>]+)>|<@([A-Za-z0-9]+)>|<!(here|channel|everyone)(?:\|@(?:here|channel|everyone))?>")
        .unwrap()
});

/// Substitution table built from one directory snapshot
#[derive(Debug, Clone, Default)]
pub struct MentionReplacer {
    /// user id -> `@name`
    names: HashMap<String, String>,
}

impl MentionReplacer {
    pub fn from_users(users: &[User]) -> Self {
        let names = users
            .iter()
            .map(|u| (u.id.clone(), format!("@{}", u.name)))
            .collect();
        Self { names }
    }

    /// Fetch the whole directory and build a table from it
    pub async fn build_from_directory(directory: &dyn UserRepository) -> Result<Self> {
        let users = directory.get_all().await?;
        let replacer = Self::from_users(&users);
        debug!("Mention table built with {} users", replacer.len());
        Ok(replacer)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn replace(&self, text: &str) -> String {
        MENTION_TOKEN
            .replace_all(text, |caps: &Captures| {
                if let Some(label) = caps.get(2) {
                    return label.as_str().to_string();
                }
                if let Some(id) = caps.get(3) {
                    // Unknown users keep their raw token
                    return self
                        .names
                        .get(id.as_str())
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string());
                }
                match caps.get(4) {
                    Some(group) => format!("@{}", group.as_str()),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
