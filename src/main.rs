use anyhow::{bail, Context, Result};
use kitclass::upload::UploadEvent;
use kitclass::{logging, CourseSession, Services, Settings, UploadClient, ViewerContext};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

const USAGE: &str = "usage: kitclass lessons <course-id> [email] | kitclass upload <path>";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("KITCLASS_CONFIG").ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("Failed to load settings")?;
    logging::init(&settings.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["lessons", course_id] => list_lessons(&settings, course_id, None).await,
        ["lessons", course_id, email] => list_lessons(&settings, course_id, Some(*email)).await,
        ["upload", path] => upload(&settings, Path::new(path)).await,
        _ => bail!(USAGE),
    }
}

async fn list_lessons(settings: &Settings, course_id: &str, email: Option<&str>) -> Result<()> {
    let services = Services::from_settings(settings)?;
    let ctx = ViewerContext::new(email.map(str::to_string), course_id);

    let (session, _events) = match CourseSession::load(&services, ctx, course_id).await {
        Ok(loaded) => loaded,
        Err(e) => bail!("{} ({})", e.user_message(), e),
    };

    println!("{} lessons in {}", session.lessons().len(), course_id);
    for (i, lesson) in session.lessons().iter().enumerate() {
        let source = session.source(i);
        let playable = source.as_ref().is_some_and(|s| s.is_playable());
        println!(
            "{:>3}. {} [{}] {:.0}% {}",
            lesson.number,
            lesson.title,
            lesson.length,
            session.progress_for(i) * 100.0,
            if playable { "" } else { "(locked)" }
        );
    }

    Ok(())
}

async fn upload(settings: &Settings, path: &Path) -> Result<()> {
    let client = UploadClient::new(&settings.upload)?;
    let (tx, mut rx) = mpsc::channel(64);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::State(state) => tracing::info!("Upload state: {:?}", state),
                UploadEvent::Server(message) => tracing::debug!("Server: {:?}", message),
            }
        }
    });

    let result = client.upload_file(path, Some(tx)).await;
    let _ = printer.await;

    match result {
        Ok(analysis) => {
            println!("{}", analysis);
            Ok(())
        }
        Err(e) => bail!("{} ({})", e.user_message(), e),
    }
}
