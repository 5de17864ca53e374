use crate::commands::CommandResult;
use shopfloor_core::config::{AppConfig, LoadOptions};
use shopfloor_db::{connect, fixtures, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = fixtures::seed_demo(
            &pool,
            &config.approval.secret,
            &config.server.public_base_url,
        )
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = fixtures::verify_seed(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.ok() {
            Ok(seeded)
        } else {
            Err((
                "seed_verification",
                format!("demo dataset is incomplete after seeding: {verification:?}"),
                6u8,
            ))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) if seeded.job_ids.is_empty() => CommandResult::success(
            "seed",
            format!("demo shop `{}` already seeded; nothing to do", seeded.shop_id),
        ),
        Ok(seeded) => {
            let mut message = format!(
                "demo shop `{}` seeded with jobs: {}",
                seeded.shop_id,
                seeded.job_ids.join(", ")
            );
            if let Some(url) = seeded.approval_url {
                message.push_str(&format!("\npending approval link: {url}"));
            }
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
