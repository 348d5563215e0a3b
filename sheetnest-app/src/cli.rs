use sheetnest_engine::packer::SheetSpec;
use sheetnest_engine::session::NestingSession;
use tracing::info;

use crate::loader::JobSource;

/// 单个形状的需求与实际放置数量。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSummary {
    pub key: String,
    pub requested: usize,
    pub placed: usize,
}

/// 按会话中的形状顺序统计放置情况。
pub fn summarize(session: &NestingSession) -> Vec<ShapeSummary> {
    session
        .shapes()
        .iter()
        .map(|shape| ShapeSummary {
            key: shape.key().to_string(),
            requested: shape.quantity(),
            placed: session
                .layout()
                .iter()
                .filter(|entry| entry.key() == shape.key())
                .count(),
        })
        .collect()
}

/// 打印排样结果：作业来源、逐实例坐标与汇总。
pub fn print_report(session: &NestingSession, spec: &SheetSpec, source: &JobSource) {
    println!("SheetNest 排样结果");
    match source {
        JobSource::File(path) => println!("作业文件：{}", path.display()),
        JobSource::Demo => println!("使用内置示例作业"),
    }
    println!(
        "板材 {}x{}，间距 {}，镜像 {}",
        spec.width,
        spec.height,
        spec.spacing,
        if spec.allow_mirror { "允许" } else { "禁用" }
    );

    println!("放置列表：");
    for (index, entry) in session.layout().iter().enumerate() {
        println!(
            "  {:>3}. {} @ ({:.1}, {:.1}) 缩放={:.3}{}",
            index + 1,
            entry.key(),
            entry.position().x(),
            entry.position().y(),
            entry.scale(),
            if entry.mirrored() { " [镜像]" } else { "" }
        );
    }

    println!("汇总：");
    let summary = summarize(session);
    for shape in &summary {
        println!("  - {}: {}/{}", shape.key, shape.placed, shape.requested);
    }

    let placed = session.layout().len();
    let requested = session.requested_instances();
    let outline = session.placed_contours();
    info!(
        requested,
        placed,
        contours = outline.contours().len(),
        vertices = outline.vertices().len(),
        "输出排样结果"
    );
    println!("共放置 {placed}/{requested} 个实例");
}
