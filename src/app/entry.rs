//! Application entry orchestration for the fedsign CLI.

use fedsign::build_info;
use fedsign::config::load_config_with_source;
use fedsign::logging::init_logging;
use fedsign::render::Renderer;

use crate::app::commands::{account, federated, init};
use crate::app::context::build_context;
use crate::cli::{Args, Command};

/// Top-level CLI entrypoint. Returns the process exit code.
pub(crate) async fn run(args: Args) -> i32 {
    let bootstrap_renderer = Renderer::new(!args.no_color);
    match &args.command {
        Command::Version => {
            println!("{}", build_info::cli_version_text());
            return 0;
        }
        Command::Init { force } => {
            return exit_code(&bootstrap_renderer, init::run_init(&bootstrap_renderer, *force));
        }
        _ => {}
    }

    let loaded = match load_config_with_source(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            bootstrap_renderer.error(&format!("failed to load config: {err}"));
            return 1;
        }
    };
    let mut config = loaded.config;
    if args.no_color {
        config.display.color = false;
    }
    init_logging(&config.logging.filter);
    tracing::debug!(source = %loaded.source.describe(), "config loaded");

    let mut renderer = Renderer::new(config.display.color);
    if args.no_browser {
        renderer = renderer.without_browser();
    }

    let ctx = match build_context(&config, renderer) {
        Ok(ctx) => ctx,
        Err(msg) => {
            renderer.error(&msg);
            return 1;
        }
    };

    let result = match args.command {
        Command::Login { provider } => federated::run_login(&ctx, &renderer, provider).await,
        Command::Logout => federated::run_logout(&ctx, &renderer).await,
        Command::Status => federated::run_status(&ctx, &renderer),
        Command::PasswordLogin { email } => {
            account::run_password_login(&ctx, &renderer, &email).await
        }
        Command::Register {
            name,
            email,
            avatar,
        } => account::run_register(&ctx, &renderer, &name, &email, avatar).await,
        Command::Init { .. } | Command::Version => Ok(()),
    };
    exit_code(&renderer, result)
}

fn exit_code(renderer: &Renderer, result: Result<(), String>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(msg) => {
            renderer.error(&msg);
            1
        }
    }
}
