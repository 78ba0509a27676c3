use futures_util::StreamExt;
use mailchimp_api::{email_hash, Error, PageSize};
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{members_page, spawn_api, TestApi};

fn member_path(email: &str) -> String {
    format!("/3.0/lists/lid/members/{}", email_hash(email))
}

async fn mount_page(api: &TestApi, offset: usize, body: serde_json::Value, expected: u64) {
    Mock::given(path("/3.0/lists/lid/members"))
        .and(method("GET"))
        .and(query_param("count", "2"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(&api.server)
        .await;
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "type": "https://mailchimp.com/developer/marketing/docs/errors/",
        "title": "Resource Not Found",
        "status": 404,
        "detail": "The requested resource could not be found.",
        "instance": "995c5cb0-3280-4a6e-808b-3b096d0bb219",
    }))
}

#[tokio::test]
async fn page_size_equal_to_total_fetches_a_trailing_empty_page() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..2, 2), 1).await;
    mount_page(&api, 2, members_page(0..0, 2), 1).await;
    mount_page(&api, 4, members_page(0..0, 2), 0).await;

    let members: Vec<_> = api
        .client
        .iter_list_members(None, PageSize::new(2))
        .unwrap()
        .collect()
        .await;

    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.is_ok()));
    assert_eq!(api.requests_to("/3.0/lists/lid/members").await.len(), 2);
}

#[tokio::test]
async fn one_more_than_page_size_fetches_two_pages_in_order() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..2, 3), 1).await;
    mount_page(&api, 2, members_page(2..3, 3), 1).await;
    mount_page(&api, 4, members_page(0..0, 3), 0).await;

    let ids: Vec<String> = api
        .client
        .iter_list_members(None, PageSize::new(2))
        .unwrap()
        .map(|m| m.unwrap()["id"].as_str().unwrap().to_string())
        .collect()
        .await;

    assert_eq!(ids, ["id0", "id1", "id2"]);
}

#[tokio::test]
async fn an_empty_page_before_the_total_does_not_end_the_stream() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..2, 5), 1).await;
    mount_page(&api, 2, members_page(0..0, 5), 1).await;
    mount_page(&api, 4, members_page(4..5, 5), 1).await;
    mount_page(&api, 6, members_page(0..0, 5), 0).await;

    let ids: Vec<String> = api
        .client
        .iter_list_members(None, PageSize::new(2))
        .unwrap()
        .map(|m| m.unwrap()["id"].as_str().unwrap().to_string())
        .collect()
        .await;

    assert_eq!(ids, ["id0", "id1", "id4"]);
}

#[tokio::test]
async fn empty_list_yields_nothing() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..0, 0), 1).await;

    let members: Vec<_> = api
        .client
        .iter_list_members(None, PageSize::new(2))
        .unwrap()
        .collect()
        .await;

    assert!(members.is_empty());
}

#[tokio::test]
async fn iteration_restarts_from_the_first_page() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..1, 1), 2).await;

    for _ in 0..2 {
        let members: Vec<_> = api
            .client
            .iter_list_members(None, PageSize::new(2))
            .unwrap()
            .collect()
            .await;
        assert_eq!(members.len(), 1);
    }
}

#[tokio::test]
async fn a_failing_page_ends_the_stream_with_an_error() {
    let api = spawn_api().await;
    mount_page(&api, 0, members_page(0..2, 6), 1).await;
    Mock::given(path("/3.0/lists/lid/members"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&api.server)
        .await;

    let results: Vec<_> = api
        .client
        .iter_list_members(None, PageSize::new(2))
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok() && results[1].is_ok());
    assert_eq!(results[2].as_ref().unwrap_err().status().unwrap().as_u16(), 503);
}

#[tokio::test]
async fn iterating_without_a_list_fails_fast() {
    let api = spawn_api().await;
    let base_url = format!("{}/3.0", api.server.uri());
    let client = mailchimp_api::Client::new(base_url, "user", "key").unwrap();

    assert!(matches!(
        client.iter_list_members(None, PageSize::default()),
        Err(Error::MissingListId)
    ));
}

#[tokio::test]
async fn get_list_members_passes_count_and_offset() {
    let api = spawn_api().await;
    Mock::given(path("/3.0/lists/lid/members"))
        .and(method("GET"))
        .and(query_param("count", "100"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_page(0..3, 3)))
        .expect(1)
        .mount(&api.server)
        .await;

    let page = api.client.get_list_members(None, 100, 0).await.unwrap();
    assert_eq!(page["total_items"], 3);
}

#[tokio::test]
async fn member_lookup_hashes_the_lowercased_email() {
    let api = spawn_api().await;
    Mock::given(path(member_path("ada@example.com")))
        .and(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"email_address": "ada@example.com"})),
        )
        .expect(1)
        .mount(&api.server)
        .await;

    let member = api
        .client
        .get_list_member(None, "Ada@Example.com")
        .await
        .unwrap();

    assert_eq!(member.unwrap()["email_address"], "ada@example.com");
}

#[tokio::test]
async fn unknown_member_is_none() {
    let api = spawn_api().await;
    Mock::given(path(member_path("nobody@example.com")))
        .respond_with(not_found())
        .expect(1)
        .mount(&api.server)
        .await;

    let member = api
        .client
        .get_list_member(None, "nobody@example.com")
        .await
        .unwrap();

    assert!(member.is_none());
}

#[tokio::test]
async fn member_lookup_propagates_auth_failures() {
    let api = spawn_api().await;
    Mock::given(path(member_path("ada@example.com")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "https://mailchimp.com/developer/marketing/docs/errors/",
            "title": "API Key Invalid",
            "status": 401,
            "detail": "Your API key may be invalid.",
        })))
        .expect(1)
        .mount(&api.server)
        .await;

    let res = api.client.get_list_member(None, "ada@example.com").await;

    match res {
        Err(Error::Mailchimp(e)) => {
            assert_eq!(e.status.as_u16(), 401);
            assert_eq!(e.problem().unwrap().title, "API Key Invalid");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn member_lookup_propagates_server_errors() {
    let api = spawn_api().await;
    Mock::given(path(member_path("ada@example.com")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&api.server)
        .await;

    let res = api.client.get_list_member(None, "ada@example.com").await;

    assert_eq!(res.unwrap_err().status().unwrap().as_u16(), 500);
}

#[tokio::test]
async fn update_interest_subscriptions_patches_the_member() {
    let api = spawn_api().await;
    Mock::given(path(member_path("ada@example.com")))
        .and(method("PATCH"))
        .and(body_json(json!({"interests": {"int1": true, "int2": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
        .expect(1)
        .mount(&api.server)
        .await;

    let interests = BTreeMap::from([("int1".to_string(), true), ("int2".to_string(), false)]);
    let res = api
        .client
        .update_interest_subscriptions(None, "ada@example.com", &interests)
        .await
        .unwrap();

    assert_eq!(res.unwrap()["id"], "x");
}

#[tokio::test]
async fn update_interest_subscriptions_of_unknown_member_is_none() {
    let api = spawn_api().await;
    Mock::given(path(member_path("nobody@example.com")))
        .and(method("PATCH"))
        .respond_with(not_found())
        .expect(1)
        .mount(&api.server)
        .await;

    let res = api
        .client
        .update_interest_subscriptions(None, "nobody@example.com", &BTreeMap::new())
        .await
        .unwrap();

    assert!(res.is_none());
}

#[tokio::test]
async fn archive_member_deletes_by_hash() {
    let api = spawn_api().await;
    Mock::given(path(member_path("ada@example.com")))
        .and(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&api.server)
        .await;

    assert!(api
        .client
        .archive_member(None, "ada@example.com")
        .await
        .unwrap());
}

#[tokio::test]
async fn archiving_an_unknown_member_is_false() {
    let api = spawn_api().await;
    Mock::given(path(member_path("nobody@example.com")))
        .and(method("DELETE"))
        .respond_with(not_found())
        .expect(1)
        .mount(&api.server)
        .await;

    assert!(!api
        .client
        .archive_member(None, "nobody@example.com")
        .await
        .unwrap());
}

#[tokio::test]
async fn list_scoped_reads_use_the_list_path() {
    let api = spawn_api().await;
    Mock::given(path("/3.0/lists/lid/segments"))
        .and(query_param("count", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"segments": []})))
        .expect(1)
        .mount(&api.server)
        .await;
    Mock::given(path("/3.0/lists/lid/interest-categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"categories": []})))
        .expect(1)
        .mount(&api.server)
        .await;
    Mock::given(path("/3.0/lists/lid/interest-categories/cat1/interests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"interests": []})))
        .expect(1)
        .mount(&api.server)
        .await;
    Mock::given(path("/3.0/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lists": []})))
        .expect(1)
        .mount(&api.server)
        .await;

    api.client
        .get_segments(None, &[("count", "10")])
        .await
        .unwrap();
    api.client.get_list_interest_categories(None).await.unwrap();
    api.client.get_list_interests(None, "cat1").await.unwrap();
    api.client.get_lists().await.unwrap();
}
