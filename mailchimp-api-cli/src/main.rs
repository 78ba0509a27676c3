use clap::{Parser, Subcommand};
use futures_util::{stream, StreamExt};
use mailchimp_api::{BatchLimit, Client, PageSize, RestClient, Subscriber, SubscriberSource};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{io::AsyncBufReadExt, sync::Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Clone)]
#[command(name = "mailchimp-api")]
#[command(about = "A CLI tool to manage Mailchimp lists, campaigns and templates")]
struct Cli {
    #[arg(short, long, env = "MAILCHIMP_API_KEY")]
    api_key: String,
    /// Versioned API root, e.g. https://us2.api.mailchimp.com/3.0
    #[arg(short, long, env = "MAILCHIMP_BASE_URL")]
    base_url: String,
    #[arg(short, long, env = "MAILCHIMP_USERNAME", default_value = "anystring")]
    username: String,
    #[arg(short, long, env = "MAILCHIMP_LIST_ID")]
    list_id: Option<String>,
    #[arg(long, env = "MAILCHIMP_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
enum Commands {
    #[command(about = "Shows all the lists of the account")]
    Lists,
    #[command(about = "Lists all the members of the list")]
    Members {
        #[arg(long, default_value_t = 50)]
        page_size: usize,
    },
    #[command(about = "Shows a member of the list")]
    Member { email: String },
    #[command(about = "Archives a member of the list")]
    Archive { email: String },
    #[command(about = "Shows the segments of the list")]
    Segments,
    #[command(about = "Shows the interest categories of the list")]
    InterestCategories,
    #[command(about = "Shows the interests of an interest category")]
    Interests { category_id: String },
    #[command(about = "Shows all the campaigns")]
    Campaigns,
    #[command(about = "Shows a campaign")]
    Campaign { campaign_id: String },
    #[command(about = "Replicates a campaign")]
    ReplicateCampaign { campaign_id: String },
    #[command(about = "Sends a campaign")]
    SendCampaign { campaign_id: String },
    #[command(about = "Shows the templates")]
    Templates {
        /// Only user-created templates
        #[arg(long)]
        user: bool,
    },
    #[command(about = "Shows a template")]
    Template { template_id: String },
    #[command(about = "Creates a template from an HTML file")]
    CreateTemplate { name: String, html_file: PathBuf },
    #[command(about = "Replaces the name and HTML of a template")]
    UpdateTemplate {
        template_id: String,
        name: String,
        html_file: PathBuf,
    },
    #[command(about = "Subscribes the members of a JSON-lines file")]
    Subscribe {
        file: PathBuf,
        #[arg(long, default_value_t = 500)]
        batch_limit: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// What happened while streaming the subscribers file.
#[derive(Debug, Default)]
struct FileReport {
    /// Lines that are not a valid subscriber.
    malformed: usize,
    /// The read error that ended the stream early, if any.
    error: Option<std::io::Error>,
}

/// Lazily reads one subscriber per line. Blank lines are ignored and malformed
/// ones are counted. A read error ends the stream and is kept in the report.
async fn read_subscribers(
    file: PathBuf,
) -> Result<(SubscriberSource<'static>, Arc<Mutex<FileReport>>), anyhow::Error> {
    let lines = tokio::io::BufReader::new(tokio::fs::File::open(&file).await?).lines();
    let report = Arc::new(Mutex::new(FileReport::default()));

    let subscribers = stream::unfold(
        (lines, report.clone()),
        |(mut lines, report)| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<Subscriber>(&line) {
                        Ok(subscriber) => return Some((subscriber, (lines, report))),
                        Err(err) => {
                            tracing::warn!(%err, "skipping malformed subscriber");
                            report.lock().await.malformed += 1;
                        }
                    },
                    Ok(None) => return None,
                    Err(err) => {
                        tracing::error!(%err, "could not read subscribers file");
                        report.lock().await.error = Some(err);
                        return None;
                    }
                }
            }
        },
    );

    Ok((SubscriberSource::from_stream(subscribers), report))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing();
    let args = Cli::parse();

    let rest = RestClient::new(
        args.base_url.as_str(),
        args.username.as_str(),
        args.api_key.as_str(),
        Duration::from_secs(args.timeout_secs),
    )?;
    let mut client = Client::from_rest(rest);
    if let Some(list_id) = &args.list_id {
        client = client.with_list_id(list_id);
    }

    match args.command {
        Commands::Lists => print_json(&client.get_lists().await?)?,
        Commands::Members { page_size } => {
            let members = client.iter_list_members(None, PageSize::new(page_size))?;
            println!("id,email_address,full_name");
            members
                .for_each(|res| async move {
                    match res {
                        Ok(member) => println!(
                            "{},{},\"{}\"",
                            member["id"].as_str().unwrap_or_default(),
                            member["email_address"].as_str().unwrap_or_default(),
                            member["full_name"].as_str().unwrap_or_default()
                        ),
                        Err(err) => eprintln!("{err}"),
                    }
                })
                .await;
        }
        Commands::Member { email } => match client.get_list_member(None, &email).await? {
            Some(member) => print_json(&member)?,
            None => anyhow::bail!("No member with email {email}"),
        },
        Commands::Archive { email } => {
            if client.archive_member(None, &email).await? {
                println!("Archived {email}");
            } else {
                anyhow::bail!("Could not archive {email}");
            }
        }
        Commands::Segments => print_json(&client.get_segments(None, &[]).await?)?,
        Commands::InterestCategories => {
            print_json(&client.get_list_interest_categories(None).await?)?
        }
        Commands::Interests { category_id } => {
            print_json(&client.get_list_interests(None, &category_id).await?)?
        }
        Commands::Campaigns => print_json(&client.get_campaigns(&[]).await?)?,
        Commands::Campaign { campaign_id } => {
            print_json(&client.get_campaign_info(&campaign_id).await?)?
        }
        Commands::ReplicateCampaign { campaign_id } => {
            print_json(&client.replicate_campaign(&campaign_id).await?)?
        }
        Commands::SendCampaign { campaign_id } => {
            client.send_campaign(&campaign_id).await?;
            println!("Sent campaign {campaign_id}");
        }
        Commands::Templates { user } => {
            let templates = if user {
                client.get_user_templates(&[]).await?
            } else {
                client.get_templates(&[]).await?
            };
            print_json(&templates)?
        }
        Commands::Template { template_id } => {
            print_json(&client.get_template_info(&template_id).await?)?
        }
        Commands::CreateTemplate { name, html_file } => {
            print_json(&client.create_template(&name, html_file).await?)?
        }
        Commands::UpdateTemplate {
            template_id,
            name,
            html_file,
        } => print_json(&client.update_template(&template_id, &name, html_file).await?)?,
        Commands::Subscribe { file, batch_limit } => {
            let (subscribers, file_report) = read_subscribers(file).await?;
            let report = client
                .batch_subscribe(subscribers, None, BatchLimit::new(batch_limit))
                .await?;
            let mut file_report = file_report.lock().await;
            println!(
                "Submitted {} members in {} requests, skipped {} malformed lines",
                report.submitted, report.requests, file_report.malformed
            );
            if let Some(err) = file_report.error.take() {
                anyhow::bail!(
                    "Stopped reading the subscribers file after {} members: {err}",
                    report.submitted
                );
            }
        }
    }

    Ok(())
}
