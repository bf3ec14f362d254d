fn main() {
    marching_terrain::gpu::run();
}
