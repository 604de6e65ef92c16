//! # Screens 模块
//!
//! 演示用的绘本画面实现：页面 / 模态 / 标签页全部接到 nav-runtime 上。
//! 真实应用中这些画面由资源系统实例化，这里直接在加载器里构造。

use std::cell::RefCell;
use std::io::Write as _;
use std::rc::Rc;
use std::time::Duration;

use nav_runtime::{
    BoxFuture, LoadError, ModalLoader, ModalManager, ModalWindow, OwnerLink, Page, PageContext,
    PageFadeResult, PageLoader, PageManager, PageResult, Payload, RouterNode, Sheet, SheetManager,
    SheetTab, TabId,
};
use tracing::info;

/// 根路由器的页面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootPage {
    Title,
    Chapter,
    Story,
}

/// 故事页内的子页
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryChild {
    Display,
    Ask,
}

/// 模态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppModal {
    Message,
}

struct TitlePage;

impl Page for TitlePage {
    fn on_pre_open(&self, _ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            println!("—— 标题 ——  AI 绘本剧场");
            PageResult::Success
        })
    }

    fn on_after_fade_in(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            println!("    输入 chapter 进入章节列表");
            PageResult::Success
        })
    }
}

struct ChapterPage;

impl Page for ChapterPage {
    fn on_pre_open(&self, ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            let chapter = ctx.args.downcast_ref::<u32>().copied().unwrap_or(1);
            println!("—— 章节列表 ——  当前选择：第 {chapter} 章");
            PageResult::Success
        })
    }
}

struct DisplayPage;

impl Page for DisplayPage {
    fn on_pre_open(&self, _ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            println!("    ◇ 绘本页面：插图与正文在此展示");
            PageResult::Success
        })
    }
}

struct AskPage;

impl Page for AskPage {
    fn on_pre_open(&self, _ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            println!("    ◇ 提问：向 AI 描述下一页的情节");
            PageResult::Success
        })
    }
}

struct StoryChildLoader;

impl PageLoader<StoryChild> for StoryChildLoader {
    fn load_page(&self, key: StoryChild) -> BoxFuture<'_, Result<Rc<dyn Page>, LoadError>> {
        Box::pin(async move {
            match key {
                StoryChild::Display => Ok(Rc::new(DisplayPage) as Rc<dyn Page>),
                StoryChild::Ask => Ok(Rc::new(AskPage) as Rc<dyn Page>),
            }
        })
    }
}

/// 故事页：内嵌子路由器，打开时进入默认子页
pub struct StoryPage {
    router: PageManager<StoryChild>,
}

impl StoryPage {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            router: PageManager::new(Rc::new(StoryChildLoader) as Rc<dyn PageLoader<StoryChild>>),
        })
    }

    /// 子路由器句柄（宿主用来在故事内导航）
    pub fn router(&self) -> PageManager<StoryChild> {
        self.router.clone()
    }
}

impl Page for StoryPage {
    fn attach_owner(&self, owner: OwnerLink) {
        self.router.set_parent(owner);
    }

    fn as_router(&self) -> Option<&dyn RouterNode> {
        Some(&self.router)
    }

    fn on_pre_open(&self, _ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            println!("—— 故事 ——");
            if self.router.current_page_type().is_none() {
                // 首次进入打开默认子页；淡入淡出由正在打开的父级统一播放
                return self
                    .router
                    .open_page(StoryChild::Display, true, Payload::none())
                    .await;
            }
            PageResult::Success
        })
    }
}

/// 根页面加载器：构造各页面并播放路由器级的淡入淡出
pub struct RootScreenLoader {
    fade_frame_millis: u64,
    fade_frames: u32,
    story: RefCell<Option<Rc<StoryPage>>>,
}

impl RootScreenLoader {
    pub fn new(fade_frame_millis: u64, fade_frames: u32) -> Rc<Self> {
        Rc::new(Self {
            fade_frame_millis,
            fade_frames,
            story: RefCell::new(None),
        })
    }

    pub fn story_router(&self) -> Option<PageManager<StoryChild>> {
        self.story.borrow().as_ref().map(|page| page.router())
    }

    async fn play_fade(&self, label: &str) {
        print!("    {label} ");
        for _ in 0..self.fade_frames {
            print!("·");
            let _ = std::io::stdout().flush();
            tokio::time::sleep(Duration::from_millis(self.fade_frame_millis)).await;
        }
        println!();
    }
}

impl PageLoader<RootPage> for RootScreenLoader {
    fn load_page(&self, key: RootPage) -> BoxFuture<'_, Result<Rc<dyn Page>, LoadError>> {
        Box::pin(async move {
            info!(?key, "加载页面");
            match key {
                RootPage::Title => Ok(Rc::new(TitlePage) as Rc<dyn Page>),
                RootPage::Chapter => Ok(Rc::new(ChapterPage) as Rc<dyn Page>),
                RootPage::Story => {
                    let page = StoryPage::new();
                    *self.story.borrow_mut() = Some(page.clone());
                    Ok(page as Rc<dyn Page>)
                }
            }
        })
    }

    fn on_fade_out(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(async move {
            self.play_fade("淡出").await;
            PageFadeResult::Play
        })
    }

    fn on_fade_in(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(async move {
            self.play_fade("淡入").await;
            PageFadeResult::Play
        })
    }
}

struct MessageModal;

impl ModalWindow for MessageModal {
    fn on_pre_open(&self, args: Payload) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let text = args.downcast_ref::<String>().cloned().unwrap_or_default();
            println!("    ┌ 模态 ────────────");
            println!("    │ {text}");
            println!("    └ 输入 close 关闭");
            Ok(())
        })
    }
}

/// 模态加载器：背景遮罩用一行提示模拟
pub struct AppModalLoader;

impl ModalLoader<AppModal> for AppModalLoader {
    fn load_modal(&self, key: AppModal) -> BoxFuture<'_, Result<Rc<dyn ModalWindow>, LoadError>> {
        Box::pin(async move {
            match key {
                AppModal::Message => Ok(Rc::new(MessageModal) as Rc<dyn ModalWindow>),
            }
        })
    }

    fn set_backdrop(&self, visible: bool) {
        if visible {
            println!("    （背景遮罩亮起）");
        } else {
            println!("    （背景遮罩熄灭）");
        }
    }
}

struct PanelSheet {
    title: String,
}

impl Sheet for PanelSheet {
    fn on_open(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            println!("    ▸ 面板：{}", self.title);
        })
    }
}

struct PanelTab {
    sheet: Rc<PanelSheet>,
}

impl PanelTab {
    fn new(title: &str) -> Rc<Self> {
        Rc::new(Self {
            sheet: Rc::new(PanelSheet {
                title: title.to_string(),
            }),
        })
    }
}

impl SheetTab for PanelTab {
    fn sheet(&self) -> Option<Rc<dyn Sheet>> {
        Some(self.sheet.clone() as Rc<dyn Sheet>)
    }
}

/// 终端宿主应用：各管理器显式注入，没有全局单例
pub struct App {
    pub root: PageManager<RootPage>,
    pub modals: ModalManager<AppModal>,
    pub sheets: SheetManager,
    pub save_tab: TabId,
    pub load_tab: TabId,
    loader: Rc<RootScreenLoader>,
}

impl App {
    pub fn new(fade_frame_millis: u64, fade_frames: u32) -> Self {
        let loader = RootScreenLoader::new(fade_frame_millis, fade_frames);
        let root = PageManager::new(loader.clone() as Rc<dyn PageLoader<RootPage>>);
        let modals = ModalManager::new(Rc::new(AppModalLoader) as Rc<dyn ModalLoader<AppModal>>);
        let sheets = SheetManager::new();
        let save_tab = sheets.register_tab(PanelTab::new("存档") as Rc<dyn SheetTab>);
        let load_tab = sheets.register_tab(PanelTab::new("读档") as Rc<dyn SheetTab>);
        Self {
            root,
            modals,
            sheets,
            save_tab,
            load_tab,
            loader,
        }
    }

    /// 故事页的子路由器（进入故事页后可用）
    pub fn story_router(&self) -> Option<PageManager<StoryChild>> {
        self.loader.story_router()
    }
}
