// Indexed quad drawn from device-local vertex and index buffers

use vk_samples::Sample;

fn main() -> anyhow::Result<()> {
    vk_samples::run(Sample::IndexedQuad)
}
