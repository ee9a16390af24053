use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde_json::json;

use crate::common::{MAX_UPLOAD, TestApp, TestResponse, routes, track_metadata};

mod coordinated_upload {
    use super::*;

    #[tokio::test]
    async fn upload_binds_the_audio_to_a_new_track() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_track(
                &json!({
                    "title": "Moonlight Drive",
                    "artist": "The Doors",
                    "album": "Strange Days",
                    "genre": "rock",
                    "duration": 163,
                    "format": "MP3",
                }),
                b"ID3 some audio".to_vec(),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["state"], "bound");
        assert_eq!(res.body["offset"], 14);
        assert_eq!(res.body["length"], 14);
        let locator = res.body["locator"].as_str().unwrap();
        assert_eq!(locator.len(), 32);
        assert_eq!(res.header("location"), Some(format!("/upload/{locator}").as_str()));

        let track_id = res.body["track_id"].as_str().unwrap();
        let track = app.get_with_token(&routes::track(track_id), &token).await;
        assert_eq!(track.status, 200);
        assert_eq!(track.body["title"], "Moonlight Drive");
        assert_eq!(track.body["format"], "mp3");
        assert_eq!(track.body["locator"], locator);

        let me = app.get_with_token(routes::ME, &token).await;
        assert_eq!(track.body["owner_id"], me.body["id"]);
    }

    #[tokio::test]
    async fn uploaded_audio_can_be_played_back() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let track_id = app
            .create_track(&token, track_metadata("Roadhouse Blues", "The Doors"))
            .await;

        let play = app.get_with_token(&routes::track_play(&track_id), &token).await;
        assert_eq!(play.status, 200, "{}", play.text);
        let url = play.body["track_url"].as_str().unwrap();
        assert!(url.starts_with("/upload/"));

        let audio = app.get_with_token(url, &token).await;
        assert_eq!(audio.status, 200);
        assert_eq!(audio.text, "ID3 audio");
    }

    #[tokio::test]
    async fn invalid_metadata_creates_nothing() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_track(
                &json!({"title": "", "artist": "Nobody", "format": "mp3"}),
                b"audio".to_vec(),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let list = app.get_with_token(routes::TRACKS, &token).await;
        assert_eq!(list.body["tracks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected_without_a_track() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("Too Big", "Nobody").to_string())
            .part("file", reqwest::multipart::Part::bytes(b"audio".to_vec()));
        let res = app
            .request(
                reqwest::Method::POST,
                &format!("{}?upload_length={}", routes::TRACK_UPLOAD, MAX_UPLOAD + 1),
                Some(&token),
            )
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);

        let list = app.get_with_token(routes::TRACKS, &token).await;
        assert_eq!(list.body["tracks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_declared_length_is_rejected_without_a_track() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("No Length", "Nobody").to_string())
            .part("file", reqwest::multipart::Part::bytes(b"audio".to_vec()));
        let res = app
            .request(reqwest::Method::POST, routes::TRACK_UPLOAD, Some(&token))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let res = TestResponse::from_response(res).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let list = app.get_with_token(routes::TRACKS, &token).await;
        assert_eq!(list.body["tracks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn malformed_declared_length_is_a_json_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("Bad Length", "Nobody").to_string())
            .part("file", reqwest::multipart::Part::bytes(b"audio".to_vec()));
        let res = app
            .request(
                reqwest::Method::POST,
                &format!("{}?upload_length=abc", routes::TRACK_UPLOAD),
                Some(&token),
            )
            .multipart(form)
            .send()
            .await
            .unwrap();
        let res = TestResponse::from_response(res).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(res.body["message"].is_string());
    }

    #[tokio::test]
    async fn non_multipart_body_is_a_json_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .request(reqwest::Method::POST, &routes::track_upload(5), Some(&token))
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await
            .unwrap();
        let res = TestResponse::from_response(res).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn short_body_can_be_resumed_at_the_returned_location() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("Half", "Nobody").to_string())
            .part("file", reqwest::multipart::Part::bytes(b"first".to_vec()));
        let res = app
            .request(
                reqwest::Method::POST,
                &routes::track_upload(10),
                Some(&token),
            )
            .multipart(form)
            .send()
            .await
            .unwrap();
        let res = TestResponse::from_response(res).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["state"], "bound");
        assert_eq!(res.body["offset"], 5);
        assert_eq!(res.body["length"], 10);

        let location = res.body["location"].as_str().unwrap().to_string();
        let patched = app.patch_upload(&location, 5, b"-rest".to_vec(), &token).await;
        assert_eq!(patched.status, 204, "{}", patched.text);
        assert_eq!(patched.header("upload-offset"), Some("10"));

        let audio = app.get_with_token(&location, &token).await;
        assert_eq!(audio.text, "first-rest");
    }

    #[tokio::test]
    async fn missing_file_part_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("No File", "Nobody").to_string());
        let res = app
            .request(reqwest::Method::POST, &routes::track_upload(5), Some(&token))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn upload_requires_authentication() {
        let app = TestApp::spawn().await;

        let form = reqwest::multipart::Form::new()
            .text("metadata", track_metadata("Anon", "Nobody").to_string())
            .part("file", reqwest::multipart::Part::bytes(b"audio".to_vec()));
        let res = app
            .request(reqwest::Method::POST, &routes::track_upload(5), None)
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 401);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn descriptor_lookup_handles_more_ids_than_bind_parameters() {
        use server::tracks::DescriptorStore;
        use server::tracks::sea::SeaDescriptorStore;

        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Needle", "A")).await;

        let mut ids: Vec<::common::TrackId> =
            (0..70_000).map(|_| ::common::TrackId::generate()).collect();
        ids.push(id.parse().unwrap());

        let store = SeaDescriptorStore::new(app.db.clone());
        let found = store.get_many(&ids).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor.title, "Needle");
    }

    #[tokio::test]
    async fn list_returns_every_track_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let other = app.create_authenticated_user("bob", "securepass").await;

        let first = app.create_track(&token, track_metadata("First", "A")).await;
        let second = app.create_track(&other, track_metadata("Second", "B")).await;

        let res = app.get_with_token(routes::TRACKS, &token).await;

        assert_eq!(res.status, 200);
        let tracks = res.body["tracks"].as_array().unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0]["id"], second.as_str());
        assert_eq!(tracks[1]["id"], first.as_str());
    }

    #[tokio::test]
    async fn unknown_track_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .get_with_token(
                &routes::track("01936f0e-1234-7abc-8000-000000000001"),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_track_id_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app.get_with_token(&routes::track("not-a-uuid"), &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod updating {
    use super::*;

    #[tokio::test]
    async fn owner_can_merge_metadata_fields() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app
            .create_track(
                &token,
                json!({"title": "Old", "artist": "A", "album": "LP", "format": "mp3"}),
            )
            .await;

        let res = app
            .put_with_token(
                &routes::track(&id),
                &json!({"title": "New", "album": null, "duration": 200}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["title"], "New");
        assert_eq!(res.body["artist"], "A");
        assert!(res.body["album"].is_null());
        assert_eq!(res.body["duration"], 200);
    }

    #[tokio::test]
    async fn update_is_reflected_in_search() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Before", "A")).await;

        let res = app
            .put_with_token(&routes::track(&id), &json!({"title": "After"}), &token)
            .await;
        assert_eq!(res.status, 200);
        app.indexer.flush().await.unwrap();

        let hits = app
            .post_with_token(
                routes::SEARCH,
                &json!({"group_search": {"fields": ["title"], "query": "After"}}),
                &token,
            )
            .await;
        assert_eq!(hits.status, 200, "{}", hits.text);
        assert_eq!(hits.body["tracks"].as_array().unwrap().len(), 1);
        assert_eq!(hits.body["tracks"][0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn non_owner_cannot_update_a_track() {
        let app = TestApp::spawn().await;
        let owner = app.create_authenticated_user("alice", "securepass").await;
        let other = app.create_authenticated_user("bob", "securepass").await;
        let id = app.create_track(&owner, track_metadata("Mine", "A")).await;

        let res = app
            .put_with_token(&routes::track(&id), &json!({"title": "Stolen"}), &other)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn negative_duration_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Song", "A")).await;

        let res = app
            .put_with_token(&routes::track(&id), &json!({"duration": -1}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod deleting {
    use super::*;

    #[tokio::test]
    async fn owner_can_delete_a_track() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Gone", "A")).await;

        let res = app.delete_with_token(&routes::track(&id), &token).await;
        assert_eq!(res.status, 204);
        app.indexer.flush().await.unwrap();

        let get = app.get_with_token(&routes::track(&id), &token).await;
        assert_eq!(get.status, 404);

        let hits = app.post_with_token(routes::SEARCH, &json!({}), &token).await;
        assert_eq!(hits.body["tracks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn owner_can_delete_a_track_missing_its_descriptor() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Leftover", "A")).await;
        app.db
            .execute_raw(Statement::from_string(
                DbBackend::Postgres,
                format!("DELETE FROM track_descriptor WHERE id = '{id}'"),
            ))
            .await
            .unwrap();

        let get = app.get_with_token(&routes::track(&id), &token).await;
        assert_eq!(get.status, 404);

        let res = app.delete_with_token(&routes::track(&id), &token).await;
        assert_eq!(res.status, 204, "{}", res.text);

        let again = app.delete_with_token(&routes::track(&id), &token).await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn non_owner_cannot_delete_a_track() {
        let app = TestApp::spawn().await;
        let owner = app.create_authenticated_user("alice", "securepass").await;
        let other = app.create_authenticated_user("bob", "securepass").await;
        let id = app.create_track(&owner, track_metadata("Mine", "A")).await;

        let res = app.delete_with_token(&routes::track(&id), &other).await;

        assert_eq!(res.status, 403);
        let get = app.get_with_token(&routes::track(&id), &owner).await;
        assert_eq!(get.status, 200);
    }
}

mod locator_binding {
    use super::*;

    #[tokio::test]
    async fn binding_the_same_locator_again_is_a_no_op() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Song", "A")).await;
        let locator = app.get_with_token(&routes::track(&id), &token).await.body["locator"]
            .as_str()
            .unwrap()
            .to_string();

        let res = app
            .put_with_token(&routes::track_locator(&id), &json!({"locator": locator}), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["locator"], locator.as_str());
    }

    #[tokio::test]
    async fn binding_a_different_locator_conflicts() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Song", "A")).await;
        let location = app.create_upload(4, &token).await;
        let other_locator = location.rsplit('/').next().unwrap();

        let res = app
            .put_with_token(
                &routes::track_locator(&id),
                &json!({"locator": other_locator}),
                &token,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn binding_an_unknown_upload_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Song", "A")).await;

        let res = app
            .put_with_token(
                &routes::track_locator(&id),
                &json!({"locator": "0123456789abcdef0123456789abcdef"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn malformed_locator_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_track(&token, track_metadata("Song", "A")).await;

        let res = app
            .put_with_token(&routes::track_locator(&id), &json!({"locator": "xyz"}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}
