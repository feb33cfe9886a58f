/// 烟雾/火焰检测桌面程序
///
/// 线程结构:
/// 1. 主线程:   macroquad 事件循环, 持有全部窗口和弹窗
/// 2. 检测线程: 每次点击"偵測圖片"/"偵測影片"启动一个
/// 3. 解码线程: 视频模式下由 FFmpeg 解码, 有界通道交给检测线程
use clap::Parser;
use env_logger::Env;
use firewatch::{AppConfig, Args, DetectionTally, OnnxBackend, Renderer, RunController};
use macroquad::prelude::*;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "YOLO 物件偵測".to_owned(),
        window_width: 1280,
        window_height: 800,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = AppConfig::from_args(&args);
    config.print_summary();

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let backend = Arc::new(OnnxBackend::new(config.clone()));
    let controller = RunController::new(
        config.clone(),
        backend,
        Arc::new(DetectionTally::new()),
        events_tx,
    );
    let mut renderer = Renderer::new(controller, events_rx, &config);

    loop {
        renderer.update();
        renderer.handle_input();
        renderer.draw();
        renderer.draw_egui();
        if renderer.should_quit() {
            break;
        }
        next_frame().await;
    }

    log::info!("👋 程序退出");
}
