use clap::Parser;
use slot_reserver::utils::error::ErrorSeverity;
use slot_reserver::utils::{logger, validation::Validate};
use slot_reserver::{
    CliConfig, HttpReservationClient, ReservationOutcome, ReserverError,
    SessionBootstrap, StdinCodePrompt, TelegramNotifier, TomlConfig,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting slot-reserver");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        fail_config(&e);
    }

    let config = match TomlConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => fail_config(&e),
    };
    if let Err(e) = config.validate() {
        fail_config(&e);
    }

    // --token > [auth] token > JWT 環境變數
    let token = cli
        .token
        .clone()
        .or_else(|| config.token().map(str::to_string))
        .or_else(|| std::env::var("JWT").ok())
        .unwrap_or_default();

    let client_settings = config.client_settings()?;
    let request_timeout = client_settings.timeout;
    let client = Arc::new(HttpReservationClient::new(
        client_settings,
        Arc::new(StdinCodePrompt),
    )?);
    let notifier = Arc::new(TelegramNotifier::new(
        config.telegram_api_base(),
        config.telegram_bot_token().map(str::to_string),
        config.telegram_chat_ids(),
        request_timeout,
    )?);
    if !notifier.is_configured() {
        tracing::info!("📨 Telegram notifications disabled");
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Ctrl-C received, stopping...");
            signal.cancel();
        }
    });

    let bootstrap = SessionBootstrap::new(client.clone(), client, notifier)
        .with_settings(config.engine_settings())
        .with_label(config.service.queue.clone());

    match run(&cli, bootstrap, token, &shutdown).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!(
                "❌ Reservation run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,      // 取消或可忽略
                ErrorSeverity::Medium => 2,   // 可重試
                ErrorSeverity::High => 1,     // 處理錯誤
                ErrorSeverity::Critical => 3, // 憑證/系統錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn run(
    cli: &CliConfig,
    bootstrap: SessionBootstrap,
    token: String,
    shutdown: &CancellationToken,
) -> Result<(), ReserverError> {
    let reserver = bootstrap.start(token).await?;

    let Some(strategy) = cli.strategy() else {
        // 只有 mfa 子命令不是搶號策略
        let two_factor = reserver.two_factor_token().await?;
        println!("🔑 Two-factor token: {}", two_factor);
        return Ok(());
    };

    report(reserver.run(strategy, shutdown).await?);
    Ok(())
}

fn report(outcome: Option<ReservationOutcome>) {
    match outcome {
        Some(outcome) if outcome.committed => {
            tracing::info!("✅ Reserved slot {} on {}", outcome.slot.id, outcome.slot.date);
            println!("✅ Reserved slot {} on {}", outcome.slot.id, outcome.slot.date);
        }
        Some(outcome) => {
            tracing::warn!("❌ Every attempt was rejected, last slot tried: {}", outcome.slot.id);
            println!("❌ Slots were found but none could be reserved");
        }
        None => {
            println!("ℹ️ No reservation made");
        }
    }
}

fn fail_config(e: &ReserverError) -> ! {
    tracing::error!("❌ Configuration validation failed: {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(1);
}
