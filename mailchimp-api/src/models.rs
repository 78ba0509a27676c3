use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt::Display};

/// One page of `lists/{list_id}/members`. Members are kept as raw JSON.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct MembersPage {
    #[serde(default)]
    pub members: Vec<Value>,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MergeFields {
    #[serde(rename = "FNAME")]
    pub first_name: String,
    #[serde(rename = "LNAME")]
    pub last_name: String,
}

/// A single create-or-update entry of a list batch update.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MemberUpsert {
    pub email_address: String,
    pub merge_fields: MergeFields,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interests: BTreeMap<String, bool>,
}

/// Body of `POST lists/{list_id}`.
#[derive(Serialize, Clone, Debug)]
pub struct BatchUpsertRequest<'a> {
    pub members: &'a [MemberUpsert],
    pub update_existing: bool,
}

#[derive(Serialize, Debug)]
pub struct InterestsPatch<'a> {
    pub interests: &'a BTreeMap<String, bool>,
}

#[derive(Serialize, Debug)]
pub struct CampaignTemplate<'a> {
    pub id: u64,
    pub sections: &'a BTreeMap<String, String>,
}

/// Body of `PUT campaigns/{campaign_id}/content`.
#[derive(Serialize, Debug)]
pub struct CampaignContentRequest<'a> {
    pub template: CampaignTemplate<'a>,
}

/// Body of `PATCH campaigns/{campaign_id}`.
#[derive(Serialize, Debug)]
pub struct CampaignSettingsRequest<'a, S: ?Sized> {
    pub settings: &'a S,
}

/// Body of `POST templates` and `PATCH templates/{template_id}`.
#[derive(Serialize, Debug)]
pub struct TemplateRequest<'a> {
    pub name: &'a str,
    pub html: &'a str,
}

/// Outcome of a batch subscribe. Per-member results reported by Mailchimp
/// inside an accepted batch are not inspected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of batch update requests issued.
    pub requests: usize,
    /// Number of members sent across all requests.
    pub submitted: usize,
}

/// Problem document Mailchimp returns alongside error statuses.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MailchimpError {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: Option<String>,
    pub instance: Option<String>,
}

impl Display for MailchimpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.title,
            self.status,
            self.detail.as_deref().unwrap_or_default()
        )
    }
}
