use crate::{
    error::Error,
    models::{
        BatchReport, BatchUpsertRequest, CampaignContentRequest, CampaignSettingsRequest,
        CampaignTemplate, InterestsPatch, MembersPage, TemplateRequest,
    },
    rest::RestClient,
    subscriber::{BatchLimit, SubscriberSource},
};
use async_gen::gen;
use futures_core::Stream;
use md5::{Digest, Md5};
use reqwest::IntoUrl;
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, path::Path, time::Duration};

/// Number of members requested per page while iterating a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    /// A page size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        Self(size.max(1))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(50)
    }
}

/// Query string pairs forwarded as-is to Mailchimp (`fields`, `count`, `status`, ...).
pub type Params<'a> = &'a [(&'a str, &'a str)];

/// Identifier Mailchimp uses to address a list member: the hex MD5 digest of
/// the lowercased email address.
pub fn email_hash(email: &str) -> String {
    hex::encode(Md5::digest(email.to_lowercase().as_bytes()))
}

#[derive(Clone, Debug)]
pub struct Client {
    rest: RestClient,
    list_id: Option<String>,
}

/// A Mailchimp marketing API client.
///
/// List-scoped methods take an `Option<&str>` list id. `None` falls back to the
/// list configured with [`Client::with_list_id`]; if there is none the call
/// fails with [`Error::MissingListId`] without touching the network.
impl Client {
    /// Creates a client for a versioned API root such as
    /// `https://us2.api.mailchimp.com/3.0`, with a 10 seconds request timeout.
    pub fn new<U: IntoUrl, S: Into<String>>(
        base_url: U,
        username: S,
        api_key: S,
    ) -> Result<Self, Error> {
        let rest = RestClient::new(base_url, username, api_key, Duration::from_secs(10))?;
        Ok(Self::from_rest(rest))
    }

    pub fn from_rest(rest: RestClient) -> Self {
        Self {
            rest,
            list_id: None,
        }
    }

    /// Sets the list used when a list-scoped call is given no list id.
    pub fn with_list_id<S: Into<String>>(mut self, list_id: S) -> Self {
        self.list_id = Some(list_id.into());
        self
    }

    pub fn default_list_id(&self) -> Option<&str> {
        self.list_id.as_deref()
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub async fn get_lists(&self) -> Result<Value, Error> {
        self.rest.send(self.rest.get("lists")).await
    }

    pub async fn get_campaigns(&self, params: Params<'_>) -> Result<Value, Error> {
        let request = self.rest.get("campaigns").query(params);
        self.rest.send(request).await
    }

    pub async fn get_campaign_info(&self, campaign_id: &str) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}");
        self.rest.send(self.rest.get(&path)).await
    }

    pub async fn get_campaign_content(&self, campaign_id: &str) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}/content");
        self.rest.send(self.rest.get(&path)).await
    }

    pub async fn replicate_campaign(&self, campaign_id: &str) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}/actions/replicate");
        self.rest.send(self.rest.post(&path)).await
    }

    pub async fn create_campaign<B: Serialize + ?Sized>(
        &self,
        campaign: &B,
    ) -> Result<Value, Error> {
        let request = self.rest.post("campaigns").json(campaign);
        self.rest.send(request).await
    }

    /// Fills the sections of a template-based campaign.
    pub async fn set_campaign_content(
        &self,
        campaign_id: &str,
        template_id: u64,
        sections: &BTreeMap<String, String>,
    ) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}/content");
        let body = CampaignContentRequest {
            template: CampaignTemplate {
                id: template_id,
                sections,
            },
        };
        self.rest.send(self.rest.put(&path).json(&body)).await
    }

    pub async fn set_campaign_settings<S: Serialize + ?Sized>(
        &self,
        campaign_id: &str,
        settings: &S,
    ) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}");
        let body = CampaignSettingsRequest { settings };
        self.rest.send(self.rest.patch(&path).json(&body)).await
    }

    pub async fn send_campaign(&self, campaign_id: &str) -> Result<Value, Error> {
        let path = format!("campaigns/{campaign_id}/actions/send");
        self.rest.send(self.rest.post(&path)).await
    }

    pub async fn get_templates(&self, params: Params<'_>) -> Result<Value, Error> {
        let request = self.rest.get("templates").query(params);
        self.rest.send(request).await
    }

    /// Same as [`Client::get_templates`], restricted to user-created templates.
    pub async fn get_user_templates(&self, params: Params<'_>) -> Result<Value, Error> {
        let mut params: Vec<(&str, &str)> = params
            .iter()
            .filter(|(key, _)| *key != "type")
            .copied()
            .collect();
        params.push(("type", "user"));
        let request = self.rest.get("templates").query(&params);
        self.rest.send(request).await
    }

    pub async fn get_template_info(&self, template_id: &str) -> Result<Value, Error> {
        let path = format!("templates/{template_id}");
        self.rest.send(self.rest.get(&path)).await
    }

    pub async fn get_template_default_content(&self, template_id: &str) -> Result<Value, Error> {
        let path = format!("templates/{template_id}/default-content");
        self.rest.send(self.rest.get(&path)).await
    }

    /// Creates a template whose HTML is the content of `html_file`.
    pub async fn create_template<P: AsRef<Path>>(
        &self,
        name: &str,
        html_file: P,
    ) -> Result<Value, Error> {
        let html = read_html(html_file.as_ref()).await?;
        let body = TemplateRequest { name, html: &html };
        self.rest.send(self.rest.post("templates").json(&body)).await
    }

    pub async fn update_template<P: AsRef<Path>>(
        &self,
        template_id: &str,
        name: &str,
        html_file: P,
    ) -> Result<Value, Error> {
        let path = format!("templates/{template_id}");
        let html = read_html(html_file.as_ref()).await?;
        let body = TemplateRequest { name, html: &html };
        self.rest.send(self.rest.patch(&path).json(&body)).await
    }

    pub async fn get_list_interest_categories(
        &self,
        list_id: Option<&str>,
    ) -> Result<Value, Error> {
        let path = self.list_path(list_id, "interest-categories")?;
        self.rest.send(self.rest.get(&path)).await
    }

    pub async fn get_list_interests(
        &self,
        list_id: Option<&str>,
        interest_category_id: &str,
    ) -> Result<Value, Error> {
        let path = self.list_path(
            list_id,
            &format!("interest-categories/{interest_category_id}/interests"),
        )?;
        self.rest.send(self.rest.get(&path)).await
    }

    /// Looks a member up by email. Returns `Ok(None)` when Mailchimp answers
    /// with a member-level client error such as a 404.
    pub async fn get_list_member(
        &self,
        list_id: Option<&str>,
        email: &str,
    ) -> Result<Option<Value>, Error> {
        let path = self.member_path(list_id, email)?;
        let res = self.rest.send(self.rest.get(&path)).await;
        absorb_member_error(res, email, "find")
    }

    /// Sets the given interests of a member. Interests not in the map are left
    /// as they are.
    pub async fn update_interest_subscriptions(
        &self,
        list_id: Option<&str>,
        email: &str,
        interests: &BTreeMap<String, bool>,
    ) -> Result<Option<Value>, Error> {
        let path = self.member_path(list_id, email)?;
        let body = InterestsPatch { interests };
        let res = self.rest.send(self.rest.patch(&path).json(&body)).await;
        absorb_member_error(res, email, "update interests of")
    }

    /// Fetches a single page of members (Mailchimp defaults: 100 from offset 0).
    pub async fn get_list_members(
        &self,
        list_id: Option<&str>,
        count: usize,
        offset: usize,
    ) -> Result<Value, Error> {
        let path = self.list_path(list_id, "members")?;
        let query = [("count", count), ("offset", offset)];
        self.rest.send(self.rest.get(&path).query(&query)).await
    }

    /// Streams every member of a list, one page request at a time.
    ///
    /// Calling it again starts over from the first page.
    ///
    /// ## Example
    ///
    /// ```no_run
    /// use futures_util::StreamExt;
    /// use mailchimp_api::{Client, PageSize};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = Client::new("https://us2.api.mailchimp.com/3.0", "anystring", "api-abcd1234")?
    ///         .with_list_id("list-id");
    ///     let stream = client.iter_list_members(None, PageSize::default())?;
    ///
    ///     stream
    ///         .for_each(|member| async move {
    ///             match member {
    ///                 Ok(member) => println!("Member: {}", member["email_address"]),
    ///                 Err(err) => eprintln!("Error: {err}"),
    ///             }
    ///         })
    ///         .await;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn iter_list_members(
        &self,
        list_id: Option<&str>,
        page_size: PageSize,
    ) -> Result<impl Stream<Item = Result<Value, Error>> + '_, Error> {
        let path = self.list_path(list_id, "members")?;
        let mut offset = 0;

        let g = gen! {
            loop {
                let request = self
                    .rest
                    .get(&path)
                    .query(&[("count", page_size.0), ("offset", offset)]);

                let page: MembersPage = match self.rest.send_as(request).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                let total = page.total_items;
                for member in page.members.into_iter() {
                    yield Ok(member);
                }

                offset += page_size.0;
                if offset as u64 > total {
                    break;
                }
            }

            ()
        };

        Ok(g.into_async_iter())
    }

    /// Creates or updates members of a list in chunks of at most `limit`.
    ///
    /// Subscribers without interests are skipped. Order is preserved within
    /// and across chunks, and no request is sent for an empty chunk.
    ///
    /// ## Example
    ///
    /// ```no_run
    /// use mailchimp_api::{BatchLimit, Client, Subscriber};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = Client::new("https://us2.api.mailchimp.com/3.0", "anystring", "api-abcd1234")?;
    ///     let members = vec![Subscriber::new(
    ///         "Ada".to_string(),
    ///         "Lovelace".to_string(),
    ///         "ada@example.com".to_string(),
    ///         Some(vec!["interest-id".to_string()]),
    ///     )];
    ///     let report = client
    ///         .batch_subscribe(members, Some("list-id"), BatchLimit::default())
    ///         .await?;
    ///     println!("sent {} members in {} requests", report.submitted, report.requests);
    ///     Ok(())
    /// }
    /// ```
    #[tracing::instrument(skip_all, fields(list_id = ?list_id, limit = limit.get()))]
    pub async fn batch_subscribe<'s, S>(
        &self,
        subscribers: S,
        list_id: Option<&str>,
        limit: BatchLimit,
    ) -> Result<BatchReport, Error>
    where
        S: Into<SubscriberSource<'s>>,
    {
        let path = self.list_path(list_id, "")?;
        let mut source = subscribers.into();
        let mut report = BatchReport::default();
        let mut drained = false;

        while !drained {
            let mut chunk = Vec::with_capacity(limit.get());
            while chunk.len() < limit.get() {
                match source.next().await {
                    Some(subscriber) => chunk.extend(subscriber.upsert()),
                    None => {
                        drained = true;
                        break;
                    }
                }
            }

            if chunk.is_empty() {
                break;
            }

            let body = BatchUpsertRequest {
                members: &chunk,
                update_existing: true,
            };
            self.rest.send(self.rest.post(&path).json(&body)).await?;

            report.requests += 1;
            report.submitted += chunk.len();
            tracing::info!(members = chunk.len(), batch = report.requests, "batch sent");
        }

        Ok(report)
    }

    pub async fn get_segments(
        &self,
        list_id: Option<&str>,
        params: Params<'_>,
    ) -> Result<Value, Error> {
        let path = self.list_path(list_id, "segments")?;
        self.rest.send(self.rest.get(&path).query(params)).await
    }

    /// Archives a member. Returns `Ok(false)` when Mailchimp answers with a
    /// member-level client error.
    pub async fn archive_member(&self, list_id: Option<&str>, email: &str) -> Result<bool, Error> {
        let path = self.member_path(list_id, email)?;
        let res = self.rest.send(self.rest.delete(&path)).await;
        Ok(absorb_member_error(res, email, "archive")?.is_some())
    }

    fn list_path(&self, list_id: Option<&str>, path: &str) -> Result<String, Error> {
        let list_id = list_id
            .or(self.list_id.as_deref())
            .ok_or(Error::MissingListId)?;

        if path.is_empty() {
            Ok(format!("lists/{list_id}"))
        } else {
            Ok(format!("lists/{list_id}/{path}"))
        }
    }

    fn member_path(&self, list_id: Option<&str>, email: &str) -> Result<String, Error> {
        self.list_path(list_id, &format!("members/{}", email_hash(email)))
    }
}

async fn read_html(path: &Path) -> Result<String, Error> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::TemplateFile {
            path: path.to_path_buf(),
            source,
        })
}

fn absorb_member_error<T>(
    res: Result<T, Error>,
    email: &str,
    action: &str,
) -> Result<Option<T>, Error> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(Error::Mailchimp(e)) if e.is_member_level() => {
            tracing::error!(member = email, status = %e.status, "Could not {} member", action);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
