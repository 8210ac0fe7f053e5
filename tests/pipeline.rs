//! End-to-end resolution against an in-memory web.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use mashahid::unpack::pack;
use mashahid::{
    CollectedLinks, ContainerHint, ContentSite, ErrorKind, FetchRequest, FetchResponse, Fetcher,
    LinkResolver, ResolverConfig, ServerReference,
};

/// URL → (status, body). Unknown URLs fail like a refused connection.
#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeWeb {
    fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), (200, body.into()));
        self
    }

    fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), (status, String::new()));
        self
    }

    fn referer_for(&self, url: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.url == url)
            .and_then(|r| r.referer.clone())
    }
}

#[async_trait]
impl Fetcher for FakeWeb {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let (status, body) = self
            .pages
            .get(&request.url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {}", request.url))?;
        Ok(FetchResponse {
            status,
            final_url: request.url.clone(),
            body,
        })
    }

    fn user_agent(&self) -> Option<&str> {
        Some("FakeWeb/1.0")
    }
}

fn packed_player(media_url: &str) -> String {
    let script = format!(r#"jwplayer("vplayer").setup({{sources:[{{file:"{media_url}"}}],image:"/poster.jpg"}});"#);
    format!(
        "<html><body><div id='vplayer'></div><script type='text/javascript'>{}</script></body></html>",
        pack(&script, 62)
    )
}

fn url(s: &str) -> ServerReference {
    ServerReference::Url(s.to_string())
}

fn token(s: &str) -> ServerReference {
    ServerReference::Token(general_purpose::STANDARD.encode(s))
}

#[tokio::test]
async fn packed_hls_scenario() {
    let web = Arc::new(
        FakeWeb::default().page("https://vidbom.com/embed-abc.html", packed_player("https://cdn.example/video.m3u8")),
    );
    let resolver = LinkResolver::new(web);

    let links = resolver
        .resolve_all(&[url("https://vidbom.com/embed-abc.html")], None)
        .await;

    assert_eq!(links.len(), 1);
    let link = &links[0];
    assert_eq!(link.url(), "https://cdn.example/video.m3u8");
    assert_eq!(link.container(), ContainerHint::Hls);
    assert_eq!(link.source_name(), "vidbom");
    assert_eq!(link.referer(), Some("https://vidbom.com/"));
    assert_eq!(link.required_headers()["User-Agent"], "FakeWeb/1.0");
    assert!(link.playback_url().starts_with("https://cdn.example/video.m3u8#headers="));
}

#[tokio::test]
async fn page_without_packed_script_is_omitted() {
    let web = Arc::new(
        FakeWeb::default()
            .page("https://vidbom.com/embed-gone.html", "<html><h1>File was deleted</h1></html>")
            .page("https://sendvid.com/embed/ok", r#"<video src="https://cdn.example/ok.mp4"></video>"#),
    );
    let resolver = LinkResolver::new(web);

    let (extraction, report) = resolver
        .resolve_all_with_report(
            &[url("https://vidbom.com/embed-gone.html"), url("https://sendvid.com/embed/ok")],
            None,
        )
        .await;

    assert_eq!(extraction.links.len(), 1);
    assert_eq!(extraction.links[0].url(), "https://cdn.example/ok.mp4");
    assert_eq!(report.failures_of(ErrorKind::NotFound), 1);
}

#[tokio::test]
async fn unreachable_token_target_does_not_affect_others() {
    let web = Arc::new(
        FakeWeb::default()
            .page("https://sendvid.com/embed/1", r#"<video src="https://cdn.example/1.mp4"></video>"#)
            .status("https://vidoza.net/embed-2.html", 503),
    );
    let resolver = LinkResolver::new(web);

    let (extraction, report) = resolver
        .resolve_all_with_report(
            &[
                token("https://govid.me/embed-dead.html"),
                url("https://sendvid.com/embed/1"),
                url("https://vidoza.net/embed-2.html"),
            ],
            Some("https://site.example/ep/1"),
        )
        .await;

    assert_eq!(extraction.links.len(), 1);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures_of(ErrorKind::Unreachable), 2);
}

#[tokio::test]
async fn empty_reference_list() {
    let resolver = LinkResolver::new(Arc::new(FakeWeb::default()));
    assert!(resolver.resolve_all(&[], None).await.is_empty());
}

#[tokio::test]
async fn wrapper_page_delegates_to_registered_host() {
    let web = Arc::new(
        FakeWeb::default()
            .page(
                "https://reviewrate.net/v/77",
                r#"<div class="player"><iframe src="//govid.me/embed-77.html"></iframe></div>"#,
            )
            .page("https://govid.me/embed-77.html", packed_player("https://cdn.example/77/index.m3u8"))
            .page("https://reviewrate.net/v/78", r#"<iframe src="https://nobody.example/e/78"></iframe>"#),
    );
    let resolver = LinkResolver::new(web.clone());

    let (extraction, report) = resolver
        .resolve_all_with_report(
            &[url("https://reviewrate.net/v/77"), url("https://reviewrate.net/v/78")],
            Some("https://site.example/ep/77"),
        )
        .await;

    assert_eq!(extraction.links.len(), 1);
    assert_eq!(extraction.links[0].source_name(), "govid");
    assert_eq!(report.failures_of(ErrorKind::Unsupported), 1);
    assert_eq!(
        web.referer_for("https://govid.me/embed-77.html").as_deref(),
        Some("https://reviewrate.net/v/77")
    );
    assert_eq!(
        web.referer_for("https://reviewrate.net/v/77").as_deref(),
        Some("https://site.example/ep/77")
    );
}

#[tokio::test]
async fn token_decoding_to_iframe_is_followed() {
    let web = Arc::new(
        FakeWeb::default().page("https://vdbtm.shop/embed-5.html", packed_player("https://cdn.example/5_720p.mp4")),
    );
    let resolver = LinkResolver::new(web);

    let links = resolver
        .resolve_all(
            &[token(r#"<iframe src="https://vdbtm.shop/embed-5.html" frameborder="0"></iframe>"#)],
            None,
        )
        .await;

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].source_name(), "vidbom");
    assert_eq!(links[0].container(), ContainerHint::Mp4);
    assert_eq!(links[0].display_name(), "vidbom 720p");
}

#[tokio::test]
async fn duplicate_references_yield_links_once() {
    let web = Arc::new(
        FakeWeb::default().page("https://filemoon.sx/e/abc", packed_player("https://cdn.example/abc.m3u8")),
    );
    let resolver = LinkResolver::new(web.clone());

    let links = resolver
        .resolve_all(
            &[
                url("https://filemoon.sx/e/abc"),
                url("https://filemoon.sx/e/abc"),
                url("https://filemoon.sx/e/abc"),
            ],
            None,
        )
        .await;

    assert_eq!(links.len(), 1);
    assert_eq!(web.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn fifty_references_resolve_the_same_every_time() {
    let mut web = FakeWeb::default();
    let mut references = Vec::new();
    for i in 0..50 {
        match i % 5 {
            0 => references.push(url(&format!("https://cdn.example/direct/{i}.m3u8"))),
            1 => {
                let embed = format!("https://vidbom.com/embed-{i}.html");
                web = web.page(&embed, packed_player(&format!("https://cdn.example/{i}/master.m3u8")));
                references.push(url(&embed));
            }
            2 => {
                let embed = format!("https://sendvid.com/embed/{i}");
                web = web.page(&embed, format!(r#"<video src="https://cdn.example/{i}.mp4"></video>"#));
                references.push(url(&embed));
            }
            3 => references.push(url(&format!("https://govid.me/embed-missing-{i}.html"))),
            _ => references.push(token(&format!("https://vidbom.com/embed-{}.html", i - 3))),
        }
    }

    let config = ResolverConfig::default()
        .with_max_concurrency(8)
        .with_task_timeout(Duration::from_secs(5));
    let resolver = LinkResolver::with_config(Arc::new(web), &config);

    let first: Vec<String> = resolver
        .resolve_all(&references, None)
        .await
        .iter()
        .map(|l| l.url().to_string())
        .collect();
    // Every fifth reference fails; tokens repeat their pattern-1 neighbour.
    assert_eq!(first.len(), 40);

    for _ in 0..5 {
        let again: Vec<String> = resolver
            .resolve_all(&references, None)
            .await
            .iter()
            .map(|l| l.url().to_string())
            .collect();
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn content_page_feeds_the_sink() {
    let page = r#"
        <ul class="servers-list">
          <li data-link="https://vidbom.com/embed-ep1.html">سيرفر 1</li>
          <li data-link="https://sendvid.com/embed/ep1">سيرفر 2</li>
          <li data-link="https://govid.me/embed-dead.html">سيرفر 3</li>
        </ul>
    "#;
    let script = r#"jwplayer("vplayer").setup({sources:[{file:"https://cdn.example/ep1.m3u8",label:"1080p"}],tracks:[{file:"https://cdn.example/ep1.ar.vtt",label:"Arabic",kind:"captions"}]});"#;
    let web = Arc::new(
        FakeWeb::default()
            .page("https://site.example/watch/ep1", page)
            .page("https://vidbom.com/embed-ep1.html", format!("<script>{}</script>", pack(script, 36)))
            .page("https://sendvid.com/embed/ep1", r#"<video src="https://cdn.example/ep1.mp4"></video>"#),
    );
    let site = ContentSite::new("example", LinkResolver::new(web));

    let mut sink = CollectedLinks::default();
    assert!(site.resolve_links_for_page("https://site.example/watch/ep1", &mut sink).await);

    let urls: Vec<_> = sink.links.iter().map(|l| l.url()).collect();
    assert_eq!(urls, vec!["https://cdn.example/ep1.m3u8", "https://cdn.example/ep1.mp4"]);
    assert_eq!(sink.subtitles.len(), 1);
    assert_eq!(sink.subtitles[0].language, "Arabic");

    let mut sink = CollectedLinks::default();
    assert!(!site.resolve_links_for_page("https://site.example/watch/missing", &mut sink).await);
    assert!(sink.links.is_empty());
}

#[tokio::test]
async fn malformed_token_is_reported_and_skipped() {
    let web = Arc::new(
        FakeWeb::default().page("https://sendvid.com/embed/7", r#"<video src="https://cdn.example/7.mp4"></video>"#),
    );
    let resolver = LinkResolver::new(web);

    let (extraction, report) = resolver
        .resolve_all_with_report(
            &[
                ServerReference::Token("!!!not base64!!!".into()),
                url("https://sendvid.com/embed/7"),
            ],
            None,
        )
        .await;

    assert_eq!(extraction.links.len(), 1);
    assert_eq!(extraction.links[0].url(), "https://cdn.example/7.mp4");
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures_of(ErrorKind::Malformed), 1);
}

#[tokio::test]
async fn broken_packed_script_is_reported_and_skipped() {
    // Header claims three words, dictionary holds two
    let broken = "<script>eval(function(p,a,c,k,e,d){return p}('0(1)',10,3,'alert|x'.split('|'),0,{}))</script>";
    let web = Arc::new(
        FakeWeb::default()
            .page("https://vidbom.com/embed-broken.html", broken)
            .page("https://vidshar.tv/embed-good.html", packed_player("https://cdn.example/good.m3u8")),
    );
    let resolver = LinkResolver::new(web);

    let (extraction, report) = resolver
        .resolve_all_with_report(
            &[
                url("https://vidbom.com/embed-broken.html"),
                url("https://vidshar.tv/embed-good.html"),
            ],
            None,
        )
        .await;

    let urls: Vec<_> = extraction.links.iter().map(|l| l.url()).collect();
    assert_eq!(urls, vec!["https://cdn.example/good.m3u8"]);
    assert_eq!(report.failures_of(ErrorKind::Malformed), 1);
}
