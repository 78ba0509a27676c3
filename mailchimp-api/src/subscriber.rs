use crate::models::{MemberStatus, MemberUpsert, MergeFields};
use futures_core::Stream;
use futures_util::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde::Deserialize;

/// A person to subscribe to a list, together with the interests they opted into.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Subscriber {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    #[serde(default)]
    pub interests: Option<Vec<String>>,
}

impl Subscriber {
    pub fn new<S: Into<String>>(
        first_name: S,
        last_name: S,
        email_address: S,
        interests: Option<Vec<String>>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email_address: email_address.into(),
            interests,
        }
    }

    /// Builds the batch update entry for this subscriber.
    ///
    /// Returns `None` when the subscriber has no interests: such records are
    /// never sent. Listed interests are set to `true`, the others are left
    /// untouched on the Mailchimp side.
    pub fn upsert(&self) -> Option<MemberUpsert> {
        let interests = self.interests.as_ref().filter(|i| !i.is_empty())?;

        Some(MemberUpsert {
            email_address: self.email_address.clone(),
            merge_fields: MergeFields {
                first_name: self.first_name.clone(),
                last_name: self.last_name.clone(),
            },
            status: MemberStatus::Subscribed,
            interests: interests.iter().map(|id| (id.clone(), true)).collect(),
        })
    }
}

/// Maximum number of members sent in a single list batch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimit(usize);

impl BatchLimit {
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self(limit.max(1))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for BatchLimit {
    fn default() -> Self {
        Self(500)
    }
}

/// Where a batch subscribe pulls its subscribers from.
///
/// Both an in-memory collection and a lazily produced stream end up behind
/// the same `next` call, so the batching code does not care which one it got.
///
/// ```
/// use futures_util::stream;
/// use mailchimp_api::{Subscriber, SubscriberSource};
///
/// let members = vec![Subscriber::new("Ada", "Lovelace", "ada@example.com", None)];
/// let from_vec = SubscriberSource::from(members.clone());
/// let from_stream = SubscriberSource::from_stream(stream::iter(members));
/// # let _ = (from_vec, from_stream);
/// ```
pub struct SubscriberSource<'a> {
    inner: BoxStream<'a, Subscriber>,
}

impl<'a> SubscriberSource<'a> {
    pub fn from_stream<S>(subscribers: S) -> Self
    where
        S: Stream<Item = Subscriber> + Send + 'a,
    {
        Self {
            inner: subscribers.fuse().boxed(),
        }
    }

    /// Next subscriber, or `None` once the source is drained. Keeps returning
    /// `None` after that.
    pub async fn next(&mut self) -> Option<Subscriber> {
        self.inner.next().await
    }
}

impl<'a> From<Vec<Subscriber>> for SubscriberSource<'a> {
    fn from(subscribers: Vec<Subscriber>) -> Self {
        Self::from_stream(stream::iter(subscribers))
    }
}

impl<'a> FromIterator<Subscriber> for SubscriberSource<'a> {
    fn from_iter<I: IntoIterator<Item = Subscriber>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
