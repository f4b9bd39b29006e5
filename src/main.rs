fn main() {
    placer::app::run();
}
