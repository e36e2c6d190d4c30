// `gateway-link check-config` — load configuration the way the service does
// and report what is missing. Secrets are never printed.

use clap::Args;
use colored::Colorize;

use gateway_link_core::env::{detect_env_mode, SERVICE_TOKEN_VAR};
use gateway_link_core::{GatewayConfig, UpstreamProviderConfig};

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Upstream provider ids to check (e.g. `fortytwo`); repeatable
    #[arg(short, long = "provider")]
    providers: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: CheckConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = GatewayConfig::from_env();
    let providers: Vec<_> = args
        .providers
        .iter()
        .map(|id| (id.as_str(), UpstreamProviderConfig::from_env(id)))
        .collect();

    let failures = usize::from(gateway.is_err())
        + providers.iter().filter(|(_, p)| p.is_err()).count();

    if args.json {
        let report = serde_json::json!({
            "mode": format!("{:?}", detect_env_mode()),
            "gateway": match &gateway {
                Ok(c) => serde_json::json!({
                    "ok": true,
                    "serverUrl": c.server_url,
                    "publicUrl": c.public_url,
                    "timeoutSecs": c.timeout_secs,
                }),
                Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
            },
            "providers": providers.iter().map(|(id, p)| match p {
                Ok(c) => serde_json::json!({
                    "id": id,
                    "ok": true,
                    "authorizationUrl": c.authorization_url,
                    "tokenUrl": c.token_url,
                    "scopes": c.scopes,
                }),
                Err(e) => serde_json::json!({ "id": id, "ok": false, "error": e.to_string() }),
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} Mode: {:?}", "●".cyan(), detect_env_mode());
        println!();
        println!("{}", "Gateway".bold());
        match &gateway {
            Ok(c) => {
                println!("  {} {} set", "✓".green(), SERVICE_TOKEN_VAR);
                println!("  {} server URL: {}", "✓".green(), c.server_url);
                println!("  {} public URL: {}", "✓".green(), c.public_url);
                println!("  {} timeout: {}s", "✓".green(), c.timeout_secs);
            }
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
        for (id, provider) in &providers {
            println!();
            println!("{}", format!("Provider {id}").bold());
            match provider {
                Ok(c) => {
                    println!("  {} client credentials set", "✓".green());
                    if let Some(url) = &c.authorization_url {
                        println!("  {} authorization URL: {}", "✓".green(), url);
                    }
                    if let Some(url) = &c.token_url {
                        println!("  {} token URL: {}", "✓".green(), url);
                    }
                    if !c.scopes.is_empty() {
                        println!("  {} scopes: {}", "✓".green(), c.scopes.join(" "));
                    }
                }
                Err(e) => println!("  {} {}", "✗".red(), e),
            }
        }
        println!();
    }

    if failures > 0 {
        return Err(format!("{failures} configuration problem(s) found").into());
    }
    if !args.json {
        println!("{}", "Configuration OK".green());
    }
    Ok(())
}
