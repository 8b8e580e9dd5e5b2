//! Opsboard - Entry Point

use std::process::ExitCode;

use clap::Parser;
use opsboard::cli::{self, Cli};
use opsboard::utils::error::{as_app_error, AppError};

fn main() -> ExitCode {
    match cli::run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fel: {:#}", err);
            match as_app_error(&err) {
                Some(AppError::PermissionDenied(_)) => ExitCode::from(3),
                Some(AppError::Database(_) | AppError::Io(_) | AppError::Other(_)) | None => {
                    ExitCode::FAILURE
                }
                Some(_) => ExitCode::from(2),
            }
        }
    }
}
