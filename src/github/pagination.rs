// Follows octocrab's `Page<T>::next` links until exhausted, flattening the
// result into a single Vec. The teacher never paginated past the first page;
// every listing operation here needs to see the whole result set.

use crate::github::errors::GitHubError;
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;

pub async fn collect_all<T>(octocrab: &Octocrab, mut page: Page<T>) -> Result<Vec<T>, GitHubError>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    loop {
        items.append(&mut page.items);
        page = match octocrab.get_page(&page.next).await? {
            Some(next) => next,
            None => break,
        };
    }
    Ok(items)
}
