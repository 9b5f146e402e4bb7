use adsb_feed::FeedReader;
use async_trait::async_trait;

/// Where the dispatcher pulls raw feed lines from. `None` means the source
/// has shut down; the live reader otherwise retries forever.
#[async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self) -> Option<String>;
}

#[async_trait]
impl LineSource for FeedReader {
    async fn next_line(&mut self) -> Option<String> {
        FeedReader::next_line(self).await
    }
}
