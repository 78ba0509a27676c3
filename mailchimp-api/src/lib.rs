//! An async client for the Mailchimp marketing API: lists and members,
//! campaigns, templates and batched subscriber upserts.
//!
//! ## Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use mailchimp_api::{BatchLimit, Client, PageSize, Subscriber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>>{
//!     let client = Client::new("https://us2.api.mailchimp.com/3.0", "anystring", "api-abcd1234")?
//!         .with_list_id("list-id");
//!
//!     let members = vec![Subscriber::new(
//!         "Ada".to_string(),
//!         "Lovelace".to_string(),
//!         "ada@example.com".to_string(),
//!         Some(vec!["interest-id".to_string()]),
//!     )];
//!     client.batch_subscribe(members, None, BatchLimit::default()).await?;
//!
//!     client
//!         .iter_list_members(None, PageSize::default())?
//!         .for_each(|res| async move {
//!             match res {
//!                 Ok(member) => println!("{}", member["email_address"]),
//!                 Err(err) => eprintln!("{err}"),
//!             }
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod rest;
pub mod subscriber;

pub use client::{email_hash, Client, PageSize};
pub use error::{ApiError, Error};
pub use models::BatchReport;
pub use rest::RestClient;
pub use subscriber::{BatchLimit, Subscriber, SubscriberSource};
