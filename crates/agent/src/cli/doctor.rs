use booking_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("booking-agent doctor");
    println!("=====================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Upstream reachability
    check_upstream(config, &mut all_passed).await;

    // 4. Credential store
    check_credentials(config, &mut all_passed);

    // 5. Jobs data directory
    check_jobs_dir(config, &mut all_passed);

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
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_upstream(config: &Config, all_passed: &mut bool) {
    let url = format!("{}{}", config.upstream.base_url, config.upstream.endpoints.ping);
    let reachable = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.upstream.timeout_secs))
        .build()
    {
        Ok(client) => client.get(&url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check(
        "Upstream reachable",
        reachable,
        if reachable { url.clone() } else { format!("{url} (unreachable)") },
    );

    if !reachable {
        *all_passed = false;
    }
}

fn check_credentials(config: &Config, all_passed: &mut bool) {
    let path = std::path::Path::new(&config.credentials.path);
    let parent_ok = path.parent().map(|p| p.exists() || std::fs::create_dir_all(p).is_ok()).unwrap_or(true);

    print_check("Credential store path usable", parent_ok, config.credentials.path.clone());
    if !parent_ok {
        *all_passed = false;
    }

    if path.exists() {
        match booking_credentials::CredentialStore::new(config.credentials.path.clone(), None) {
            Ok(store) => {
                let (records, active) = store.load_all();
                let detail = match active {
                    Some(user) => format!("{} record(s), active user: {user}", records.len()),
                    None => format!("{} record(s), no active user", records.len()),
                };
                print_check("Credential store readable", true, detail);
            }
            Err(e) => {
                print_check("Credential store readable", false, e.to_string());
                *all_passed = false;
            }
        }
    } else {
        print_check("Credential store readable", true, "no store yet (first login will create it)".into());
    }
}

fn check_jobs_dir(config: &Config, all_passed: &mut bool) {
    let path = std::path::Path::new(&config.jobs.data_dir);
    if std::fs::create_dir_all(path).is_err() {
        print_check("Jobs data directory", false, format!("{} (could not create)", path.display()));
        *all_passed = false;
        return;
    }

    let probe = path.join(".booking_agent_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);

    let detail = if writable {
        format!("{} (writable)", path.display())
    } else {
        format!("{} (not writable)", path.display())
    };
    print_check("Jobs data directory", writable, detail);
    if !writable {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
