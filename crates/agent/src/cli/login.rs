//! `booking-agent login` — interactive session authentication (C5,
//! §4.5).  Drives the facade's `StartLoginSession`/`SubmitLoginSessionCode`
//! pair: prompts for a username/password, writes any captcha image to a
//! temp file for the operator to view, and loops on a typed code until
//! the session reports success or failure.

use std::io::Write;

use crate::facade::ServiceFacade;
use crate::login_session::LoginSessionStatus;

/// Runs one interactive login, returning `Ok(true)` on success.
pub async fn login(facade: &ServiceFacade, username: Option<String>, password: Option<String>) -> anyhow::Result<bool> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username: ")?,
    };
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };

    let mut info = facade.start_login_session(username, password).await?;

    loop {
        match info.status {
            LoginSessionStatus::Success => {
                println!("{}", info.message.as_deref().unwrap_or("login succeeded"));
                return Ok(true);
            }
            LoginSessionStatus::Failed => {
                eprintln!("{}", info.message.as_deref().unwrap_or("login failed"));
                return Ok(false);
            }
            LoginSessionStatus::AwaitingCaptcha => {
                if let Some(message) = &info.message {
                    println!("{message}");
                }
                let Some(image_b64) = &info.captcha_image_base64 else {
                    eprintln!("server requested a captcha but sent no image");
                    return Ok(false);
                };
                let path = write_captcha_image(image_b64)?;
                println!("captcha image written to {} — open it, then enter the code", path.display());
                let code = prompt("Captcha code: ")?;
                info = facade.submit_login_session_code(info.session_id, Some(code)).await?;
            }
        }
    }
}

fn write_captcha_image(base64_png: &str) -> anyhow::Result<std::path::PathBuf> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD.decode(base64_png)?;
    let path = std::env::temp_dir().join(format!("booking-agent-captcha-{}.png", std::process::id()));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
