//! Skapande av användarprofiler (endast administratörer)

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::db::Database;
use crate::models::{Profile, Role};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    pub department: Option<String>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            role,
            department: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !is_valid_email(&self.email) {
            return Err(AppError::validation(format!(
                "Ogiltig e-postadress: {}",
                self.email
            )));
        }
        if self.full_name.trim().is_empty() {
            return Err(AppError::validation("Namn saknas"));
        }
        Ok(())
    }
}

/// Enkel kontroll: en lokal del, ett @ och en domän med punkt
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub struct UserAdminService<'a> {
    db: &'a Database,
}

impl<'a> UserAdminService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_user(&self, actor: &Profile, new_user: NewUser) -> Result<Profile> {
        new_user.validate()?;

        let mut profile = Profile::new(
            new_user.email.trim().to_lowercase(),
            new_user.full_name.trim(),
            new_user.role,
        );
        profile.department = new_user.department;

        self.db.profiles().create(actor, &mut profile)?;
        info!("{} skapade användaren {}", actor.email, profile.email);

        Ok(profile)
    }
}
