use std::sync::Arc;

use kura_asset::{Asset, MemoryBundle, SceneAsset};

#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
}
impl Asset for Texture {
    const NAME: &'static str = "Texture";
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: usize,
}
impl Asset for Mesh {
    const NAME: &'static str = "Mesh";
}

const TEXTURES: &[(&str, u32)] = &[
    ("textures/grass.png", 256),
    ("textures/stone.png", 512),
    ("textures/sky.png", 2048),
    ("textures/ui/cursor.png", 32),
];

const MESHES: &[(&str, usize)] = &[("meshes/cube.obj", 8), ("meshes/sphere.obj", 482)];

/// The bundle every subcommand loads from
pub fn bundle(threads: usize, failing: &[String]) -> anyhow::Result<Arc<MemoryBundle>> {
    let bundle = if threads == 0 {
        MemoryBundle::new("demo")
    } else {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|ix| format!("demo-bundle-{}", ix))
            .build()?;
        MemoryBundle::with_threadpool("demo", Arc::new(thread_pool))
    };

    for (url, size) in TEXTURES {
        bundle.insert(
            url,
            Texture {
                width: *size,
                height: *size,
            },
        );
    }
    for (url, vertices) in MESHES {
        bundle.insert(url, Mesh { vertices: *vertices });
    }
    bundle.insert_scene(
        "levels/intro.scene",
        SceneAsset {
            name: "intro".into(),
            dependencies: vec!["meshes/cube.obj".into(), "textures/grass.png".into()],
        },
    );
    bundle.insert_scene(
        "levels/sky.scene",
        SceneAsset {
            name: "sky".into(),
            dependencies: vec!["meshes/sphere.obj".into(), "textures/sky.png".into()],
        },
    );

    for url in failing {
        bundle.fail_on(url);
    }
    log::debug!("{:?}", bundle);

    Ok(Arc::new(bundle))
}
