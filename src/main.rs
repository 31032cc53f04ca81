//! Stack Deck - 本地栈服务控制面
//!
//! Usage:
//! - Normal mode: `stack-deck`
//! - With custom port: `stack-deck --port 7171`
//! - Listen on all interfaces: `stack-deck --host 0.0.0.0`

use stack_deck::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                if config.port_override.is_none() {
                    eprintln!("Ignoring invalid port: {}", args[i + 1]);
                }
                i += 2;
            }
            "--host" if i + 1 < args.len() => {
                config.host_override = Some(args[i + 1].clone());
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Stack Deck - 本地栈服务控制面");
    println!();
    println!("USAGE:");
    println!("    stack-deck [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port (default 7070)");
    println!("    --host <ADDR>    Override the listening address (default 127.0.0.1)");
    println!("    -h, --help       Print help information");
    println!();
    println!("EXAMPLES:");
    println!("    stack-deck                        # Normal mode");
    println!("    stack-deck --port 7171            # Custom port");
    println!("    stack-deck --host 0.0.0.0         # All interfaces");
}

fn main() {
    let config = parse_args();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(stack_deck::init_and_run_with_config(config)) {
        eprintln!("stack-deck: {:#}", e);
        std::process::exit(1);
    }
}
