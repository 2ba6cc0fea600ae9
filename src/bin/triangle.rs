// Hello triangle: vertices come straight from the vertex shader

use vk_samples::Sample;

fn main() -> anyhow::Result<()> {
    vk_samples::run(Sample::Triangle)
}
