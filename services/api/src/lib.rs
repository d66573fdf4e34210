mod cli;
mod infra;
mod routes;
mod score;
mod server;

use risk_predictors::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
