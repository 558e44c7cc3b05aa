use kube::core::CustomResourceExt;
use myapp_controller::crd::my_app::MyApp;

fn main() {
    let crd = MyApp::crd();
    let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
    println!("{}", yaml);
}
