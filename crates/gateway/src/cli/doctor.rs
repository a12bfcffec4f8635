use ac_domain::config::{Config, ConfigSeverity, SandboxMode};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("agentcore doctor");
    println!("================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Sandbox backend
    check_sandbox_backend(config, &mut all_passed).await;

    // 4. LLM providers
    check_llm_providers(config, &mut all_passed);

    // 5. Workspace directory
    check_workspace(config, &mut all_passed);

    // Summary
    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!(
                "{} issue(s) ({} error(s))",
                issues.len(),
                error_count,
            ),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_sandbox_backend(config: &Config, all_passed: &mut bool) {
    match config.sandbox.mode {
        SandboxMode::Local => {
            print_check("Sandbox backend", true, "local (tools run in-process)".into());
        }
        SandboxMode::Container => {
            print_check(
                "Sandbox backend",
                true,
                format!("container (image {})", config.sandbox.container.image),
            );
        }
        SandboxMode::RemoteVm => {
            let Some(api_base_url) = config.sandbox.remote_vm.api_base_url.as_ref() else {
                print_check("Sandbox backend", false, "remote_vm mode but no api_base_url configured".into());
                *all_passed = false;
                return;
            };
            let reachable = match reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
            {
                Ok(client) => client.get(api_base_url).send().await.is_ok(),
                Err(_) => false,
            };
            print_check(
                "Sandbox backend",
                reachable,
                if reachable {
                    format!("remote_vm ({api_base_url})")
                } else {
                    format!("remote_vm ({api_base_url}, unreachable)")
                },
            );
            if !reachable {
                *all_passed = false;
            }
        }
    }
}

fn check_llm_providers(config: &Config, all_passed: &mut bool) {
    let count = config.llm.models.len();
    let ok = count > 0;

    print_check(
        "LLM models configured",
        ok,
        if ok {
            format!("{count} model(s)")
        } else {
            "none configured".into()
        },
    );

    if !ok {
        *all_passed = false;
    }
}

fn check_workspace(config: &Config, all_passed: &mut bool) {
    let path = &config.workspace.path;
    let exists = path.exists();
    let writable = if exists {
        let probe = path.join(".agentcore_doctor_probe");
        let w = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        w
    } else {
        false
    };

    let ok = exists && writable;
    let detail = match (exists, writable) {
        (true, true) => format!("{} (writable)", path.display()),
        (true, false) => format!("{} (not writable)", path.display()),
        _ => format!("{} (does not exist)", path.display()),
    };

    print_check("Workspace directory", ok, detail);

    if !ok {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
