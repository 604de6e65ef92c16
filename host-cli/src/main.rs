//! # host-cli
//!
//! nav-runtime 的终端宿主演示：把绘本应用的页面流
//! （标题 → 章节 → 故事，故事内嵌子页）、消息模态与存读档面板
//! 接到导航运行时上，在终端里完整走一遍生命周期。

mod screens;
mod settings;

use std::io::Write as _;

use anyhow::Result;
use clap::Parser;
use nav_runtime::{ModalOptions, PageResult, Payload};
use tracing::warn;

use screens::{App, AppModal, RootPage, StoryChild};
use settings::UserSettings;

#[derive(Parser, Debug)]
#[command(name = "host-cli", about = "页面导航运行时的终端演示宿主")]
struct Args {
    /// 运行预设演示流程后退出
    #[arg(long)]
    demo: bool,

    /// 用户设置文件路径
    #[arg(long, default_value = "user_settings.json")]
    settings: String,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = UserSettings::load(&args.settings);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run(args, settings))
}

async fn run(args: Args, settings: UserSettings) -> Result<()> {
    let app = App::new(settings.fade_frame_millis, settings.fade_frames);
    let _ = app
        .root
        .open_page(RootPage::Title, true, Payload::none())
        .await;

    if args.demo {
        run_demo(&app, &settings).await
    } else {
        run_repl(&app, &settings, &args.settings).await
    }
}

/// 预设演示流程：页面栈、嵌套子页、模态与面板各走一遍
async fn run_demo(app: &App, settings: &UserSettings) -> Result<()> {
    let _ = app
        .root
        .open_page(
            RootPage::Chapter,
            true,
            Payload::new(settings.default_chapter),
        )
        .await;
    let _ = app.root.open_page(RootPage::Story, true, Payload::none()).await;

    if let Some(story) = app.story_router() {
        let _ = story.open_page(StoryChild::Ask, true, Payload::none()).await;
    }

    let modal = app
        .modals
        .open_modal(
            AppModal::Message,
            Payload::new("生成完成，继续阅读吗？".to_string()),
            ModalOptions::default(),
        )
        .await?;
    let _ = modal.close().await;

    let _ = app.sheets.select_tab(app.save_tab).await;
    let _ = app.sheets.select_tab(app.load_tab).await;

    // 返回：故事内 Ask → Display，然后故事 → 章节 → 标题
    let _ = app.root.back_page().await;
    let _ = app.root.back_page().await;
    let _ = app.root.back_page().await;

    println!();
    println!("演示结束");
    Ok(())
}

/// 交互循环：按命令驱动导航
async fn run_repl(app: &App, settings: &UserSettings, settings_path: &str) -> Result<()> {
    print_help();
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        match command {
            "title" => {
                let _ = app.root.open_page(RootPage::Title, true, Payload::none()).await;
            }
            "chapter" => {
                let number: u32 = parts
                    .next()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(settings.default_chapter);
                let _ = app
                    .root
                    .open_page(RootPage::Chapter, true, Payload::new(number))
                    .await;
            }
            "story" => {
                let _ = app.root.open_page(RootPage::Story, true, Payload::none()).await;
            }
            "ask" | "display" => match app.story_router() {
                Some(story) => {
                    let key = if command == "ask" {
                        StoryChild::Ask
                    } else {
                        StoryChild::Display
                    };
                    let _ = story.open_page(key, true, Payload::none()).await;
                }
                None => println!("先进入故事页（story）"),
            },
            "back" => report(app.root.back_page().await),
            "next" => report(app.root.next_page().await),
            "modal" => {
                let text = parts.collect::<Vec<_>>().join(" ");
                let text = if text.is_empty() { "提示".to_string() } else { text };
                app.modals
                    .open_modal(AppModal::Message, Payload::new(text), ModalOptions::default())
                    .await?;
            }
            "close" => {
                if app.modals.close_top_modal().await.is_none() {
                    println!("没有打开中的模态");
                }
            }
            "save" => {
                let _ = app.sheets.select_tab(app.save_tab).await;
            }
            "load" => {
                let _ = app.sheets.select_tab(app.load_tab).await;
            }
            "stack" => {
                println!(
                    "历史 {} 项，光标 {}",
                    app.root.page_stack_len(),
                    app.root.page_stack_index()
                );
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("未知命令：{other}（help 查看命令）"),
        }
    }

    if let Err(e) = settings.save(settings_path) {
        warn!(error = %e, "保存用户设置失败");
    }
    Ok(())
}

fn report(result: PageResult) {
    if result == PageResult::Cancel {
        println!("已经到头了");
    }
}

fn print_help() {
    println!("命令：title / chapter [n] / story / ask / display / back / next");
    println!("      modal [文字] / close / save / load / stack / help / quit");
}
