use comment_exporter::{
    BrowserSession, CommentScraper, LaunchOptions, LiveDocument, NoProgress, ScrapeConfig, ScrapeError,
};

const THREAD_PAGE: &str = r#"<html><body>
<div role="dialog">
  <div style="overflow-y: auto; height: 400px">
    <div role="article" aria-label="Comment by Ann Lee 2 days ago">
      <a href="/ann.lee"><span dir="auto">Ann Lee</span></a>
      <div dir="auto">Great post, thanks for sharing</div>
      <span id="more" role="button">View 1 reply</span>
    </div>
    <div role="article" aria-label="Comment by Dan 1 day ago">
      <a href="/dan"><span dir="auto">Dan</span></a>
      <div dir="auto">I disagree with most of this</div>
    </div>
  </div>
</div>
<script>
document.getElementById('more').addEventListener('click', function () {
  var reply = document.createElement('div');
  reply.setAttribute('role', 'article');
  reply.setAttribute('aria-label', 'Comment by Bob 5 hours ago');
  reply.innerHTML = '<a href="/bob"><span dir="auto">Bob</span></a><div dir="auto">Agreed, well said</div>';
  this.parentNode.appendChild(reply);
  this.remove();
});
</script>
</body></html>"#;

fn open(html: &str) -> BrowserSession {
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    session
        .navigate(&format!("data:text/html,{}", urlencoding::encode(html)))
        .expect("Failed to navigate");
    std::thread::sleep(std::time::Duration::from_millis(500));
    session
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_snapshot_keeps_refs_stable() {
    let session = open(THREAD_PAGE);
    let config = ScrapeConfig::instant();
    let mut doc = session.document(&config).expect("Failed to open document");

    let container = doc
        .locate_container(&config.container_selector)
        .expect("Failed to locate container")
        .expect("No container");
    let first = doc.snapshot(container).expect("Failed to snapshot");
    let second = doc.snapshot(container).expect("Failed to snapshot");

    assert_eq!(first.node_ref(first.root()), Some(container));
    assert_eq!(first.len(), second.len());
    let articles: Vec<_> = first.select(first.root(), |n| n.has_role("article")).collect();
    assert_eq!(articles.len(), 2);
    for article in articles {
        let node_ref = first.node_ref(article).expect("article has a ref");
        assert!(second.find_by_ref(node_ref).is_some());
    }
}

#[test]
#[ignore]
fn test_scrape_expands_replies() {
    let session = open(THREAD_PAGE);
    let config = ScrapeConfig::instant();
    let mut doc = session.document(&config).expect("Failed to open document");

    let outcome = CommentScraper::new(config).run(&mut doc, &mut NoProgress).expect("Scrape failed");
    let authors: Vec<_> = outcome.comments.iter().map(|c| c.author.as_str()).collect();

    assert_eq!(authors, vec!["Ann Lee", "Bob", "Dan"]);
    assert_eq!(outcome.comments[1].depth, 1);
    assert_eq!(outcome.comments[1].parent_id.as_deref(), Some(outcome.comments[0].id.as_str()));
    assert_eq!(outcome.stats.controls_activated, 1);
}

#[test]
#[ignore]
fn test_page_without_thread_view() {
    let session = open("<html><body><p>No comments here</p></body></html>");
    let config = ScrapeConfig::instant();
    let mut doc = session.document(&config).expect("Failed to open document");

    let result = CommentScraper::new(config).run(&mut doc, &mut NoProgress);
    assert!(matches!(result, Err(ScrapeError::ContainerNotFound(_))));
}
