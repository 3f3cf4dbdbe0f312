mod catalog;
mod cli;
mod infra;
mod routes;
mod server;

use campus_core::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
