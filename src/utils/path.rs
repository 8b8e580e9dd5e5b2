use std::path::PathBuf;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("se", "opsboard", "Opsboard")
}

/// Hämta standardsökväg för databasen
pub fn get_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("opsboard.db"))
        .unwrap_or_else(|| PathBuf::from("opsboard.db"))
}

/// Hämta standardsökväg för inställningsfilen
pub fn get_config_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("settings.toml"))
}

/// Hämta standardkatalog för exporter
pub fn get_export_directory() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("exports"))
        .unwrap_or_else(|| PathBuf::from("exports"))
}
