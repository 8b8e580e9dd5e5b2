//! Behörighetskontroll i de skrivande operationerna.
//!
//! Gränssnittet kan dölja knappar, men det är kontrollen här som gäller.
//! Aktören slås upp i `profiles` på samma anslutning som skrivningen, så
//! roll och aktiv-flagga tas från databasen och aldrig från den
//! `Profile` som anroparen skickar in.

use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use crate::db::profile_repo::ProfileRepository;
use crate::models::{Capability, Profile};
use crate::utils::error::{AppError, AppResult};

/// Pröva en redan uppslagen profil mot behörigheten
pub fn check(profile: &Profile, capability: Capability) -> AppResult<()> {
    if profile.can(capability) {
        return Ok(());
    }

    warn!(
        "Nekad åtgärd {:?} för {} ({})",
        capability, profile.email, profile.role
    );

    Err(AppError::permission_denied(format!(
        "{} saknar behörighet {:?}",
        profile.email, capability
    )))
}

/// Kräv att den lagrade profilen bakom `actor` har behörigheten.
/// Anropas med låst anslutning eller öppen transaktion.
pub fn require(conn: &Connection, actor: &Profile, capability: Capability) -> Result<Profile> {
    let stored = match actor.id {
        Some(id) => ProfileRepository::read(conn, id)?,
        None => None,
    };

    let Some(stored) = stored else {
        warn!("Okänd aktör {} nekas {:?}", actor.email, capability);
        return Err(AppError::permission_denied(format!(
            "{} är inte en registrerad profil",
            actor.email
        ))
        .into());
    };

    check(&stored, capability)?;
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{lock, Database};
    use crate::models::Role;

    fn denied(result: Result<Profile>) -> bool {
        matches!(
            result.unwrap_err().downcast_ref::<AppError>(),
            Some(AppError::PermissionDenied(_))
        )
    }

    #[test]
    fn test_check() {
        let staff = Profile::new("s@example.com", "Staff", Role::Staff);
        assert!(check(&staff, Capability::RecordSustainability).is_ok());
        assert!(matches!(
            check(&staff, Capability::ManageAssets),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_require_uses_stored_role() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let mut staff = Profile::new("s@example.com", "Staff", Role::Staff);
        db.profiles().insert(&mut staff).unwrap();

        // Rollen i minnet ändras men raden i databasen är fortfarande staff
        let mut promoted = staff.clone();
        promoted.role = Role::Admin;

        let conn = lock(&db.conn).unwrap();
        assert!(require(&conn, &admin, Capability::ManageUsers).is_ok());
        assert!(require(&conn, &promoted, Capability::RecordSustainability).is_ok());
        assert!(denied(require(&conn, &promoted, Capability::ManageUsers)));
    }

    #[test]
    fn test_require_denies_unregistered_actor() {
        let db = Database::open_in_memory().unwrap();
        db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();

        let forged = Profile::new("nobody@example.com", "Nobody", Role::Admin);
        let mut wrong_id = forged.clone();
        wrong_id.id = Some(999);

        let conn = lock(&db.conn).unwrap();
        assert!(denied(require(&conn, &forged, Capability::ManageAssets)));
        assert!(denied(require(&conn, &wrong_id, Capability::ManageAssets)));
    }

    #[test]
    fn test_require_denies_deactivated_profile() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let mut manager = Profile::new("m@example.com", "Chef", Role::Manager);
        db.profiles().insert(&mut manager).unwrap();

        db.profiles()
            .set_active(&admin, manager.id.unwrap(), false)
            .unwrap();
        assert!(manager.is_active);

        let conn = lock(&db.conn).unwrap();
        assert!(denied(require(&conn, &manager, Capability::ManageAssets)));
    }
}
