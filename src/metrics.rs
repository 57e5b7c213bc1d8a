#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub image_count: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    pub total_bytes: usize,
}

impl DocumentMetrics {
    pub fn total_commands(&self) -> usize {
        self.pages.iter().map(|page| page.command_count).sum()
    }

    pub fn total_images_drawn(&self) -> usize {
        self.pages.iter().map(|page| page.image_count).sum()
    }
}
