#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    QueryTotalCount,
    StartCrawl { target: usize },
    StopCrawl,
}
