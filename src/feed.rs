//! Read-through loaders for the feed and for recipe detail pages.
//!
//! Both loaders split a load into `begin` (consult the cache, hand out a
//! request tagged with a generation number) and `complete` (commit the
//! response). A response is committed only while its generation is still
//! current and the loader is active; anything older is dropped without
//! touching the cache.

use async_trait::async_trait;

use crate::models::{Pagination, RecipeFull, RecipeListItem, RecipePage, RecipePartial};
use crate::store::RecipeStore;
use crate::transform::{merge_cached_with_recipes, partials_to_list_items};

/// Where loaders fetch recipes from when the cache misses.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> anyhow::Result<RecipePage>;

    /// `Ok(None)` when the recipe does not exist.
    async fn fetch_recipe(&self, slug: &str) -> anyhow::Result<Option<RecipeFull>>;
}

/// What the feed grid should show for the current loading state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    pub all_cached: Vec<RecipeListItem>,
    /// Placeholder content while a fetch is in flight.
    pub cached_for_loading: Vec<RecipeListItem>,
    pub display: Vec<RecipeListItem>,
}

impl FeedView {
    pub fn compute(
        is_loading: bool,
        recipes: &[RecipeListItem],
        store: &RecipeStore,
        use_cache: bool,
    ) -> Self {
        let all_cached = if use_cache {
            let mut partials = store.get_all_partials();
            partials.sort_by(|a, b| a.slug.cmp(&b.slug));
            partials_to_list_items(&partials)
        } else {
            Vec::new()
        };

        let cached_for_loading = if !use_cache || !is_loading {
            Vec::new()
        } else if recipes.is_empty() {
            all_cached.clone()
        } else {
            merge_cached_with_recipes(recipes, |slug| store.get_partial(slug))
        };

        let display = if !recipes.is_empty() {
            recipes.to_vec()
        } else {
            all_cached.clone()
        };

        Self {
            all_cached,
            cached_for_loading,
            display,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready(RecipeFull),
    NotFound,
    Failed(String),
}

/// A detail fetch handed out by [`RecipeLoader::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    slug: String,
    generation: u64,
}

impl DetailRequest {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub async fn fetch(&self, source: &dyn RecipeSource) -> anyhow::Result<Option<RecipeFull>> {
        source.fetch_recipe(&self.slug).await
    }
}

/// Resolves one recipe for a detail page, cache first.
#[derive(Debug)]
pub struct RecipeLoader {
    generation: u64,
    active: bool,
    state: LoadState,
}

impl Default for RecipeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeLoader {
    pub fn new() -> Self {
        Self {
            generation: 0,
            active: true,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start resolving `slug`. A cached full record becomes ready immediately
    /// and no request is returned. Any earlier request goes stale.
    pub fn begin(&mut self, slug: &str, store: &RecipeStore) -> Option<DetailRequest> {
        self.generation += 1;
        self.active = true;

        if let Some(full) = store.get_full(slug) {
            tracing::debug!(slug, "Recipe served from cache");
            self.state = LoadState::Ready(full);
            return None;
        }

        self.state = LoadState::Loading;
        Some(DetailRequest {
            slug: slug.to_string(),
            generation: self.generation,
        })
    }

    /// Commit the outcome of `request`. Returns false when it was stale.
    pub fn complete(
        &mut self,
        request: DetailRequest,
        result: anyhow::Result<Option<RecipeFull>>,
        store: &mut RecipeStore,
    ) -> bool {
        if !self.active || request.generation != self.generation {
            tracing::debug!(slug = %request.slug, "Dropping stale recipe response");
            return false;
        }

        self.state = match result {
            Ok(Some(full)) => {
                store.set_full(full.clone());
                LoadState::Ready(full)
            }
            Ok(None) => LoadState::NotFound,
            Err(e) => {
                tracing::warn!(slug = %request.slug, "Failed to load recipe: {:#}", e);
                LoadState::Failed(format!("{:#}", e))
            }
        };
        true
    }

    /// Stop committing responses; in-flight requests are left to finish.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    pub async fn load(
        &mut self,
        slug: &str,
        store: &mut RecipeStore,
        source: &dyn RecipeSource,
    ) -> &LoadState {
        if let Some(request) = self.begin(slug, store) {
            let result = request.fetch(source).await;
            self.complete(request, result, store);
        }
        &self.state
    }
}

/// A page fetch handed out by [`FeedLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    generation: u64,
    append: bool,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub async fn fetch(&self, source: &dyn RecipeSource) -> anyhow::Result<RecipePage> {
        source.fetch_page(self.page).await
    }
}

/// Loads feed pages, writing every item through to the cache.
#[derive(Debug)]
pub struct FeedLoader {
    generation: u64,
    active: bool,
    recipes: Vec<RecipeListItem>,
    pagination: Option<Pagination>,
    is_loading: bool,
    error: Option<String>,
    /// Last slug a pending `load_more` continues from.
    loading_from: Option<String>,
}

impl Default for FeedLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedLoader {
    pub fn new() -> Self {
        Self {
            generation: 0,
            active: true,
            recipes: Vec::new(),
            pagination: None,
            is_loading: false,
            error: None,
            loading_from: None,
        }
    }

    pub fn recipes(&self) -> &[RecipeListItem] {
        &self.recipes
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_from.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.has_more)
    }

    /// Reload from the first page. Supersedes every pending request.
    pub fn begin_initial(&mut self) -> PageRequest {
        self.generation += 1;
        self.active = true;
        self.is_loading = true;
        self.loading_from = None;
        self.error = None;
        PageRequest {
            page: 1,
            generation: self.generation,
            append: false,
        }
    }

    /// Request the page after the current one. Returns `None` when there is
    /// nothing more, or a request continuing from the same last slug is
    /// already in flight.
    pub fn begin_more(&mut self) -> Option<PageRequest> {
        if self.is_loading || !self.has_more() {
            return None;
        }
        let last = self.recipes.last()?.slug.clone();
        if self.loading_from.as_deref() == Some(last.as_str()) {
            tracing::debug!(slug = %last, "Ignoring duplicate load-more");
            return None;
        }

        let page = self.pagination.as_ref().map_or(1, |p| p.page + 1);
        self.generation += 1;
        self.loading_from = Some(last);
        Some(PageRequest {
            page,
            generation: self.generation,
            append: true,
        })
    }

    /// Commit the outcome of `request`. Returns false when it was stale.
    pub fn complete(
        &mut self,
        request: PageRequest,
        result: anyhow::Result<RecipePage>,
        store: &mut RecipeStore,
    ) -> bool {
        if !self.active || request.generation != self.generation {
            tracing::debug!(page = request.page, "Dropping stale feed response");
            return false;
        }

        if request.append {
            self.loading_from = None;
        } else {
            self.is_loading = false;
        }

        match result {
            Ok(page) => {
                store.set_partials(page.recipes.iter().map(list_item_to_partial));
                if request.append {
                    self.recipes.extend(page.recipes);
                } else {
                    self.recipes = page.recipes;
                }
                self.pagination = Some(page.pagination);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(page = request.page, "Failed to load feed: {:#}", e);
                self.error = Some(format!("{:#}", e));
            }
        }
        true
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }

    pub fn view(&self, store: &RecipeStore, use_cache: bool) -> FeedView {
        FeedView::compute(self.is_loading, &self.recipes, store, use_cache)
    }

    pub async fn load_initial(&mut self, store: &mut RecipeStore, source: &dyn RecipeSource) -> bool {
        let request = self.begin_initial();
        let result = request.fetch(source).await;
        self.complete(request, result, store)
    }

    pub async fn load_more(&mut self, store: &mut RecipeStore, source: &dyn RecipeSource) -> bool {
        let Some(request) = self.begin_more() else {
            return false;
        };
        let result = request.fetch(source).await;
        self.complete(request, result, store)
    }
}

fn list_item_to_partial(item: &RecipeListItem) -> RecipePartial {
    RecipePartial {
        slug: item.slug.clone(),
        name: item.name.clone(),
        description: item.description.clone(),
        tags: item.tags.clone(),
        image_url: item.image_url.clone(),
        prep_time_minutes: item.prep_time_minutes,
        cook_time_minutes: item.cook_time_minutes,
    }
}
